use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use stockhold_core::{ItemId, ReservationId};
use stockhold_inventory::{ExpireReservation, ReservationCommand};

use super::context::EngineContext;
use super::reservations::{execute, load};
use crate::error::{EngineError, EngineResult};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Due reservations found at the start of the sweep.
    pub examined: usize,
    pub expired: usize,
    /// Already resolved by a concurrent cancel/sale before we got the lock.
    pub skipped: usize,
    pub failed: usize,
}

/// Transitions ACTIVE reservations past their expiry to EXPIRED.
///
/// Takes the same per-item lock as the reservation manager and sales
/// processor. Never touches stock.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    ctx: Arc<EngineContext>,
}

enum Outcome {
    Expired,
    Skipped,
}

impl ExpirySweeper {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Run one sweep at the clock's current time.
    ///
    /// Listing due reservations failing is systemic and returned as-is. A
    /// single record failing is logged and the sweep moves on; if every
    /// record failed the sweep reports `SweepFailed`.
    pub fn sweep(&self) -> EngineResult<SweepReport> {
        let now = self.ctx.now();
        let due = self.ctx.store.due_reservations(now)?;

        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };

        for reservation in &due {
            let reservation_id = reservation.id_typed();
            match self.expire_one(reservation_id, reservation.item_id()) {
                Ok(Outcome::Expired) => report.expired += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    warn!(reservation_id = %reservation_id, error = %err, "failed to expire reservation");
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                expired = report.expired,
                skipped = report.skipped,
                failed = report.failed,
                "expiry sweep finished"
            );
        } else {
            debug!("expiry sweep found nothing due");
        }

        if report.failed > 0 && report.failed == report.examined {
            return Err(EngineError::SweepFailed {
                failed: report.failed,
            });
        }
        Ok(report)
    }

    fn expire_one(&self, reservation_id: ReservationId, item_id: ItemId) -> EngineResult<Outcome> {
        let ctx = &self.ctx;
        ctx.locks.with_item(item_id, || {
            let current = load(ctx, reservation_id)?;
            let now = ctx.now();
            if !current.is_due(now) {
                return Ok(Outcome::Skipped);
            }

            let command = ReservationCommand::Expire(ExpireReservation {
                reservation_id,
                occurred_at: now,
            });
            execute(ctx, current, &command)?;
            debug!(reservation_id = %reservation_id, item_id = %item_id, "reservation expired");
            Ok(Outcome::Expired)
        })
    }
}
