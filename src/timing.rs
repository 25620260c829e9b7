use std::time::{Duration, Instant};

/// the contemporary consensus for full-speed chip-8, before any multiplier
pub const BASE_INSTRUCTIONS_PER_SECOND: f64 = 660.0;

/// ~60Hz frame cadence
pub const FRAME_INTERVAL: Duration = Duration::from_nanos(16_666_700);

/// achieved-rate measurement window
const MEASURE_WINDOW: Duration = Duration::from_secs(1);

/// the adjusted budget may shrink to zero but never grow past this multiple
/// of the requested interval, else one long stall would stop the machine
const MAX_BUDGET_RATIO: f64 = 4.0;

/// milliseconds elapsed since `start`, for key-recency style bookkeeping
pub fn millis_since(start: Instant) -> u128 {
    start.elapsed().as_millis()
}

/// Paces the driver loop to a target instruction rate.
///
/// Two independent clocks live here. The instruction clock sleeps for
/// "time remaining until last tick + budget", so a slow opcode or a host
/// scheduling stall eats into the next sleep instead of accumulating
/// drift. The budget itself is nudged once a second from the measured
/// instructions-per-second, converging on the requested rate even though
/// sleep syscalls overshoot. The frame clock is a plain deadline recomputed
/// as now + 16.6667ms each time a frame is rendered.
pub struct Pacer {
    target_rate: f64,
    /// requested per-instruction interval, the fixed point the budget
    /// converges around
    base_budget: Duration,
    /// per-instruction sleep budget after feedback
    budget: Duration,
    last_tick: Option<Instant>,
    window_start: Option<Instant>,
    window_count: u32,
    next_frame: Instant,
}

impl Pacer {
    /// `speed_scale` multiplies the 660ips base rate; the caller validates
    /// it as positive
    pub fn new(speed_scale: f64) -> Self {
        let target_rate = BASE_INSTRUCTIONS_PER_SECOND * speed_scale;
        let base_budget = Duration::from_secs_f64(1.0 / target_rate);
        Pacer {
            target_rate,
            base_budget,
            budget: base_budget,
            last_tick: None,
            window_start: None,
            window_count: 0,
            next_frame: Instant::now(),
        }
    }

    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    /// sleep off whatever remains of this instruction's budget. time spent
    /// since the previous call (executing the instruction, rendering a
    /// frame) is subtracted, so the cadence self-corrects rather than
    /// drifting under jitter
    pub fn sleep_for_instruction(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_tick {
            let deadline = last + self.budget;
            if deadline > now {
                // plain thread::sleep overshoots badly at sub-ms durations
                spin_sleep::sleep(deadline - now);
            }
        }
        self.last_tick = Some(Instant::now());
    }

    /// count one executed instruction. once a second, computes the achieved
    /// rate, feeds it back into the sleep budget and reports it for
    /// telemetry
    pub fn track_instruction(&mut self) -> Option<f64> {
        let now = Instant::now();
        let start = *self.window_start.get_or_insert(now);
        self.window_count += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed < MEASURE_WINDOW {
            return None;
        }
        let achieved = self.window_count as f64 / elapsed.as_secs_f64();
        self.adjust(achieved);
        self.window_start = Some(now);
        self.window_count = 0;
        Some(achieved)
    }

    /// proportional feedback: running below target shrinks the budget,
    /// above target grows it, clamped so the loop can neither spin free
    /// nor stall
    fn adjust(&mut self, achieved_rate: f64) {
        if achieved_rate <= 0.0 {
            return;
        }
        let ratio = self.target_rate / achieved_rate;
        let nudged = self.budget.as_secs_f64() / ratio;
        let ceiling = self.base_budget.as_secs_f64() * MAX_BUDGET_RATIO;
        self.budget = Duration::from_secs_f64(nudged.clamp(0.0, ceiling));
    }

    /// is it time to render?
    pub fn frame_due(&self) -> bool {
        Instant::now() >= self.next_frame
    }

    /// rearm the frame deadline; called once per rendered frame
    pub fn frame_rendered(&mut self) {
        self.next_frame = Instant::now() + FRAME_INTERVAL;
    }

    #[cfg(test)]
    fn budget_ms(&self) -> f64 {
        self.budget.as_secs_f64() * 1000.0
    }
}
