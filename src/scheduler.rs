use crate::config::AppConfig;
use crate::protocol::{Envelope, MsgId, CMD_WORK_MID, SEND_HK_MID};
use heapless::Vec;
use serde::{Deserialize, Serialize};

pub const MAX_WAKEUP_SLOTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeupSlot {
    pub msg_id: MsgId,
    pub period_ms: u64,
    pub next_due_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerStats {
    pub total_dispatched: u32,
    pub total_missed: u32,
    pub active_slots: u8,
}

/// Fixed-rate wakeup table standing in for the host scheduler. Each slot publishes a
/// header-only message every `period_ms`.
#[derive(Debug)]
pub struct WakeupScheduler {
    slots: Vec<WakeupSlot, MAX_WAKEUP_SLOTS>,
    stats: SchedulerStats,
}

impl WakeupScheduler {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Default table: scheduled work and housekeeping requests.
    pub fn from_config(config: &AppConfig, now_ms: u64) -> Result<Self, &'static str> {
        let mut scheduler = Self::new();
        scheduler.add_slot(CMD_WORK_MID, config.work_period_ms, now_ms)?;
        scheduler.add_slot(SEND_HK_MID, config.hk_period_ms, now_ms)?;
        Ok(scheduler)
    }

    /// Add a slot; its first wakeup is one period from `now_ms`.
    pub fn add_slot(&mut self, msg_id: MsgId, period_ms: u64, now_ms: u64) -> Result<(), &'static str> {
        if period_ms == 0 {
            return Err("Wakeup period must be non-zero");
        }
        if self.slots.iter().any(|slot| slot.msg_id == msg_id) {
            return Err("Message already scheduled");
        }

        self.slots
            .push(WakeupSlot {
                msg_id,
                period_ms,
                next_due_ms: now_ms.saturating_add(period_ms),
            })
            .map_err(|_| "Wakeup table full")?;
        self.stats.active_slots = self.slots.len() as u8;
        Ok(())
    }

    /// Messages due at `now_ms`, in slot order. A slot that fell behind fires once and
    /// counts the wakeups it skipped.
    pub fn ready_messages(&mut self, now_ms: u64) -> Vec<Envelope, MAX_WAKEUP_SLOTS> {
        let mut ready = Vec::new();

        for slot in self.slots.iter_mut() {
            if slot.next_due_ms > now_ms {
                continue;
            }

            let missed = (now_ms - slot.next_due_ms) / slot.period_ms;
            slot.next_due_ms += (missed + 1) * slot.period_ms;
            self.stats.total_missed += missed as u32;

            // One slot yields at most one envelope, so this never overflows.
            let _ = ready.push(Envelope::header_only(slot.msg_id));
            self.stats.total_dispatched += 1;
        }

        ready
    }

    /// Milliseconds until the next slot fires, if any.
    pub fn next_due_in(&self, now_ms: u64) -> Option<u64> {
        self.slots
            .iter()
            .map(|slot| slot.next_due_ms.saturating_sub(now_ms))
            .min()
    }

    pub fn get_stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn slots(&self) -> &[WakeupSlot] {
        &self.slots
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.stats.active_slots = 0;
    }
}

impl Default for WakeupScheduler {
    fn default() -> Self {
        Self::new()
    }
}
