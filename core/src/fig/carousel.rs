//! FIG carousel: rotates a collection of [`FigEncoder`]s through the FIC,
//! respecting each one's repetition rate and an initial fast-announcement
//! phase that favours higher-priority FIGs.

use std::time::Duration;

use log::debug;

use super::{FigEncoder, FigPriority};

struct Scheduled {
    fig: Box<dyn FigEncoder>,
    last_emitted_ms: Option<u64>,
}

/// Rotates FIGs into FIBs. `now_ms` is supplied by the caller each tick
/// (the core loop's own clock) rather than read internally, keeping the
/// carousel's scheduling decisions deterministic and testable.
pub struct FigCarousel {
    figs: Vec<Scheduled>,
    start_time_ms: Option<u64>,
    initial_phase: Duration,
}

impl FigCarousel {
    pub fn new() -> Self {
        FigCarousel { figs: Vec::new(), start_time_ms: None, initial_phase: Duration::from_secs(5) }
    }

    pub fn add_fig(&mut self, fig: Box<dyn FigEncoder>) {
        debug!("added FIG {}/{:?} to carousel", fig.fig_type(), fig.extension());
        self.figs.push(Scheduled { fig, last_emitted_ms: None });
    }

    pub fn clear(&mut self) {
        self.figs.clear();
    }

    pub fn fig_count(&self) -> usize {
        self.figs.len()
    }

    /// Propagates the current wall clock to every registered FIG; only
    /// clock-derived encoders (FIG 0/10) act on it.
    pub fn set_wall_clock(&mut self, unix_seconds: u64) {
        for scheduled in &mut self.figs {
            scheduled.fig.set_wall_clock(unix_seconds);
        }
    }

    /// Propagates the current ETI frame number to every registered FIG;
    /// only FIG 0/0's CIF counter acts on it.
    pub fn set_frame_number(&mut self, frame_number: u64) {
        for scheduled in &mut self.figs {
            scheduled.fig.set_frame_number(frame_number);
        }
    }

    /// Fill one FIB (30 bytes in Mode I) with as many due FIGs as fit.
    /// Remaining space is padded with `0xFF`.
    pub fn fill_fib(&mut self, now_ms: u64, max_size: usize) -> Vec<u8> {
        let start = *self.start_time_ms.get_or_insert(now_ms);
        let in_initial_phase = now_ms.saturating_sub(start) < self.initial_phase.as_millis() as u64;

        let mut order: Vec<usize> = (0..self.figs.len()).collect();
        if in_initial_phase {
            order.sort_by_key(|&i| priority_rank(self.figs[i].fig.priority()));
        }

        let mut out = Vec::with_capacity(max_size);
        for idx in order {
            let remaining = max_size.saturating_sub(out.len());
            if remaining < 2 {
                break;
            }
            let scheduled = &mut self.figs[idx];
            let period = scheduled.fig.repetition_rate().period_ms();
            let due = match scheduled.last_emitted_ms {
                None => true,
                Some(last) => now_ms.saturating_sub(last) >= period,
            };
            if !due {
                continue;
            }

            let status = scheduled.fig.fill(&mut out, remaining);
            if status.bytes_written > 0 {
                scheduled.last_emitted_ms = Some(now_ms);
                debug!(
                    "wrote FIG {}: {} bytes, complete={}",
                    scheduled.fig.fig_type(),
                    status.bytes_written,
                    status.complete
                );
                if out.len() >= max_size.saturating_sub(1) {
                    break;
                }
            }
        }

        out.resize(max_size, 0xFF);
        out
    }
}

impl Default for FigCarousel {
    fn default() -> Self {
        Self::new()
    }
}

fn priority_rank(priority: FigPriority) -> u8 {
    match priority {
        FigPriority::Critical => 0,
        FigPriority::High => 1,
        FigPriority::Normal => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fig::{FigRate, FillStatus};

    #[derive(Debug)]
    struct FixedFig {
        bytes: Vec<u8>,
        rate: FigRate,
        priority: FigPriority,
    }

    impl FigEncoder for FixedFig {
        fn fill(&mut self, buffer: &mut Vec<u8>, budget: usize) -> FillStatus {
            if budget < self.bytes.len() {
                return FillStatus::none();
            }
            buffer.extend_from_slice(&self.bytes);
            FillStatus { bytes_written: self.bytes.len(), complete: true }
        }

        fn repetition_rate(&self) -> FigRate {
            self.rate
        }

        fn priority(&self) -> FigPriority {
            self.priority
        }

        fn fig_type(&self) -> u8 {
            0
        }

        fn extension(&self) -> Option<u8> {
            None
        }
    }

    #[test]
    fn fib_is_padded_with_0xff() {
        let mut carousel = FigCarousel::new();
        carousel.add_fig(Box::new(FixedFig {
            bytes: vec![0xAA, 0xBB],
            rate: FigRate::EveryFrame,
            priority: FigPriority::Critical,
        }));
        let fib = carousel.fill_fib(0, 30);
        assert_eq!(fib.len(), 30);
        assert_eq!(&fib[0..2], &[0xAA, 0xBB]);
        assert!(fib[2..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn fig_is_not_reemitted_before_its_period_elapses() {
        let mut carousel = FigCarousel::new();
        carousel.add_fig(Box::new(FixedFig {
            bytes: vec![0x01],
            rate: FigRate::B, // 1000ms period
            priority: FigPriority::Normal,
        }));
        let first = carousel.fill_fib(0, 30);
        assert_eq!(first[0], 0x01);
        let second = carousel.fill_fib(10, 30);
        assert!(second.iter().all(|&b| b == 0xFF));
        let third = carousel.fill_fib(1200, 30);
        assert_eq!(third[0], 0x01);
    }
}
