//! Audio feedback engine
//!
//! Models the sound of the machine as three continuous loops (motor hum,
//! printing spaces, printing characters) plus short effects (keys, bell,
//! carriage return, platen, lid). Keypresses and printed characters are
//! queued and played back at the machine's own pace, driven by [`Timers`]
//! polled from the presentation loop through [`SoundEngine::tick`].
//!
//! When no samples could be loaded the engine is disabled and every call is
//! a no-op.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::assets::{LidState, SoundBank, SoundError, SoundTag};
use super::effects::EffectPool;
use super::mixer::{Channel, Mixer};
use super::timer::{TimerKind, Timers};

/// Time between replays of queued keypresses
pub const KEY_DECAY: Duration = Duration::from_millis(100);
/// Time to print one character
pub const CHAR_TICK: Duration = Duration::from_millis(100);
/// Quiet time after printing before the hum returns
pub const HUM_RESUME: Duration = Duration::from_millis(100);
/// Delay before the loops restart in phase with a carriage return
pub const CR_RESYNC: Duration = Duration::from_millis(10);
/// Delay before the loops restart with the new lid variant set
pub const LID_RESYNC: Duration = Duration::from_millis(250);
/// Length of the motor-on sound
pub const POWER_ON: Duration = Duration::from_millis(1500);
/// Pause between crossfade steps
pub const FADE_STEP: Duration = Duration::from_millis(25);
/// Number of volume steps in a crossfade
pub const FADE_STEPS: u32 = 4;
/// Fade of the motor-off sound
pub const POWER_OFF_FADE: Duration = Duration::from_millis(1000);
/// How long the motor-off sound needs before the process may exit
pub const POWER_OFF_LINGER: Duration = Duration::from_millis(1500);

/// The continuous loop sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loop {
    Hum,
    Spaces,
    Chars,
}

impl Loop {
    pub const ALL: [Loop; 3] = [Loop::Hum, Loop::Spaces, Loop::Chars];

    fn index(self) -> usize {
        self as usize
    }

    fn channel(self) -> Channel {
        match self {
            Loop::Hum => Channel::HUM,
            Loop::Spaces => Channel::SPACES,
            Loop::Chars => Channel::CHARS,
        }
    }

    fn tag(self) -> SoundTag {
        match self {
            Loop::Hum => SoundTag::Hum,
            Loop::Spaces => SoundTag::PrintSpaces,
            Loop::Chars => SoundTag::PrintChars,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Voice {
    volume: f32,
    paused: bool,
}

#[derive(Debug, Clone, Copy)]
struct Crossfade {
    target: Loop,
    from: [f32; 3],
    step: u32,
}

/// Engine state when samples are available
struct Machine<M: Mixer> {
    bank: SoundBank,
    mixer: M,
    lid: LidState,
    /// Keypresses queued, including the one sounding now
    active_key_count: u32,
    /// Characters queued to print, including the one sounding now
    printout: VecDeque<char>,
    voices: [Voice; 3],
    loops_running: bool,
    effects: EffectPool,
    timers: Timers,
    fade: Option<Crossfade>,
    sync_target: Option<Loop>,
}

impl<M: Mixer> Machine<M> {
    fn new(bank: SoundBank, mixer: M, lid: LidState) -> Self {
        Self {
            bank,
            mixer,
            lid,
            active_key_count: 0,
            printout: VecDeque::new(),
            voices: [Voice::default(); 3],
            loops_running: false,
            effects: EffectPool::new(Channel::EFFECTS),
            timers: Timers::new(),
            fade: None,
            sync_target: None,
        }
    }

    fn play_effect(&mut self, tag: SoundTag) {
        if let Some(sample) = self.bank.pick(self.lid, tag) {
            let channel = self.effects.acquire(&self.mixer);
            self.mixer.play(channel, sample, false);
        }
    }

    fn play_on(&mut self, channel: Channel, tag: SoundTag) {
        if let Some(sample) = self.bank.pick(self.lid, tag) {
            self.mixer.play(channel, sample, false);
        }
    }

    /// Start every loop from its beginning with freshly picked samples
    fn restart_loops(&mut self) {
        for l in Loop::ALL {
            if let Some(sample) = self.bank.pick(self.lid, l.tag()) {
                self.mixer.play(l.channel(), sample, true);
            }
            let voice = &mut self.voices[l.index()];
            voice.paused = false;
            self.mixer.set_volume(l.channel(), voice.volume);
        }
        self.loops_running = true;
    }

    fn set_volume(&mut self, l: Loop, volume: f32) {
        let voice = &mut self.voices[l.index()];
        if volume > 0.0 && voice.paused {
            self.mixer.unpause(l.channel());
            voice.paused = false;
        }
        voice.volume = volume;
        self.mixer.set_volume(l.channel(), volume);
    }

    fn stop_fade(&mut self) {
        self.fade = None;
        self.timers.cancel(TimerKind::Fade);
    }

    /// Jump straight to one loop at full volume, or to silence
    fn solo(&mut self, target: Option<Loop>) {
        self.stop_fade();
        if !self.loops_running {
            self.restart_loops();
        }
        for l in Loop::ALL {
            self.set_volume(l, if Some(l) == target { 1.0 } else { 0.0 });
        }
    }

    fn begin_crossfade(&mut self, target: Loop, now: Instant) {
        if !self.loops_running {
            self.restart_loops();
        }
        self.fade = Some(Crossfade {
            target,
            from: self.voices.map(|voice| voice.volume),
            step: 0,
        });
        self.timers.arm_repeating(TimerKind::Fade, now, FADE_STEP);
        self.fade_step();
    }

    fn fade_step(&mut self) {
        let Some(fade) = self.fade.as_mut() else {
            self.timers.cancel(TimerKind::Fade);
            return;
        };
        fade.step += 1;
        let Crossfade { target, from, step } = *fade;
        let done = step >= FADE_STEPS;
        let t = step as f32 / FADE_STEPS as f32;

        for l in Loop::ALL {
            let to = if l == target { 1.0 } else { 0.0 };
            let start = from[l.index()];
            let volume = if done { to } else { start + (to - start) * t };
            self.set_volume(l, volume);
        }

        if done {
            self.stop_fade();
            for l in Loop::ALL {
                let voice = &mut self.voices[l.index()];
                if voice.volume == 0.0 && !voice.paused {
                    self.mixer.pause(l.channel());
                    voice.paused = true;
                }
            }
        }
    }

    /// Set the loops for the character at the head of the print queue
    fn sound_for_char(&mut self, now: Instant) {
        match self.printout.front().copied() {
            None => {
                self.timers.cancel(TimerKind::CharTick);
                self.timers.arm(TimerKind::HumResume, now, HUM_RESUME);
            }
            Some('\r') => {
                self.solo(Some(Loop::Spaces));
                self.play_effect(SoundTag::CarriageReturn);
                self.sync_target = Some(Loop::Spaces);
                self.timers.arm(TimerKind::Sync, now, CR_RESYNC);
            }
            Some('\x07') => {
                self.solo(None);
                self.play_effect(SoundTag::Bell);
            }
            Some(c) if c.is_control() || c.is_whitespace() => self.solo(Some(Loop::Spaces)),
            Some(_) => self.solo(Some(Loop::Chars)),
        }
    }

    fn start(&mut self, now: Instant) {
        info!("Sound power on ({} samples)", self.bank.len());
        self.play_on(Channel::HUM, SoundTag::MotorOn);
        self.timers.arm(TimerKind::HumResume, now, POWER_ON);
    }

    fn stop(&mut self) -> Duration {
        info!("Sound power off");
        self.timers.cancel_all();
        self.fade = None;
        self.printout.clear();
        self.active_key_count = 0;
        self.play_on(Channel::HUM, SoundTag::MotorOff);
        self.mixer.stop(Channel::SPACES);
        self.mixer.stop(Channel::CHARS);
        self.mixer.fadeout(Channel::HUM, POWER_OFF_FADE);
        POWER_OFF_LINGER
    }

    fn keypress(&mut self, now: Instant) {
        debug!("keypress");
        self.active_key_count += 1;
        if self.active_key_count > 1 {
            return;
        }
        self.play_effect(SoundTag::Key);
        self.timers.arm_repeating(TimerKind::KeyDecay, now, KEY_DECAY);
    }

    fn print_chars(&mut self, text: &str, now: Instant) {
        if text.is_empty() {
            return;
        }
        debug!("print: {:?}", text);
        let was_idle = self.printout.is_empty();
        self.printout.extend(text.chars());
        if was_idle {
            self.timers.arm_repeating(TimerKind::CharTick, now, CHAR_TICK);
            self.sound_for_char(now);
        }
    }

    fn lid(&mut self, now: Instant) {
        debug!("lid");
        self.play_on(Channel::HUM, SoundTag::Lid);
        self.lid = self.lid.toggled();
        // Printing keeps its loop; the hum comes back once the queue drains
        if self.printout.is_empty() {
            self.begin_crossfade(Loop::Hum, now);
        }
        self.sync_target = Some(Loop::Hum);
        self.timers.arm(TimerKind::Sync, now, LID_RESYNC);
    }

    fn platen(&mut self) {
        debug!("platen");
        self.play_effect(SoundTag::Platen);
    }

    fn fire(&mut self, kind: TimerKind, now: Instant) {
        match kind {
            TimerKind::HumResume => {
                debug!("hum resume");
                if self.printout.is_empty() {
                    self.begin_crossfade(Loop::Hum, now);
                }
            }
            TimerKind::KeyDecay => {
                self.active_key_count = self.active_key_count.saturating_sub(1);
                if self.active_key_count == 0 {
                    self.timers.cancel(TimerKind::KeyDecay);
                } else {
                    self.play_effect(SoundTag::Key);
                }
            }
            TimerKind::CharTick => {
                self.printout.pop_front();
                self.sound_for_char(now);
            }
            TimerKind::Sync => {
                debug!("sync");
                self.restart_loops();
                match self.sync_target.take() {
                    Some(Loop::Hum) if !self.printout.is_empty() => {}
                    Some(target) => self.solo(Some(target)),
                    None => {}
                }
            }
            TimerKind::Fade => self.fade_step(),
        }
    }

    fn tick(&mut self, now: Instant) {
        while let Some(kind) = self.timers.pop_due(now) {
            self.fire(kind, now);
        }
    }
}

/// Teletype sounds
pub struct SoundEngine<M: Mixer> {
    machine: Option<Machine<M>>,
}

impl<M: Mixer> SoundEngine<M> {
    pub fn new(bank: SoundBank, mixer: M, lid: LidState) -> Self {
        Self {
            machine: Some(Machine::new(bank, mixer, lid)),
        }
    }

    /// An engine that ignores every call
    pub fn disabled() -> Self {
        Self { machine: None }
    }

    /// Build from the outcome of loading samples; a failure disables sound
    pub fn from_bank(bank: Result<SoundBank, SoundError>, mixer: M, lid: LidState) -> Self {
        match bank {
            Ok(bank) => Self::new(bank, mixer, lid),
            Err(e) => {
                warn!("Sound disabled: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.machine.is_some()
    }

    /// Power on: motor start, then the idle hum
    pub fn start(&mut self, now: Instant) {
        if let Some(m) = self.machine.as_mut() {
            m.start(now);
        }
    }

    /// Power off. Returns how long the caller should let the sound play out.
    pub fn stop(&mut self) -> Duration {
        self.machine.as_mut().map_or(Duration::ZERO, Machine::stop)
    }

    /// A key was pressed at the keyboard
    pub fn keypress(&mut self, now: Instant) {
        if let Some(m) = self.machine.as_mut() {
            m.keypress(now);
        }
    }

    /// Characters arrived for printing
    pub fn print_chars(&mut self, text: &str, now: Instant) {
        if let Some(m) = self.machine.as_mut() {
            m.print_chars(text, now);
        }
    }

    /// Open or close the lid
    pub fn lid(&mut self, now: Instant) {
        if let Some(m) = self.machine.as_mut() {
            m.lid(now);
        }
    }

    /// The platen was turned by hand
    pub fn platen(&mut self) {
        if let Some(m) = self.machine.as_mut() {
            m.platen();
        }
    }

    /// Fire every timer due at `now`
    pub fn tick(&mut self, now: Instant) {
        if let Some(m) = self.machine.as_mut() {
            m.tick(now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.machine.as_ref().and_then(|m| m.timers.next_deadline())
    }

    pub fn lid_state(&self) -> Option<LidState> {
        self.machine.as_ref().map(|m| m.lid)
    }

    pub fn active_key_count(&self) -> u32 {
        self.machine.as_ref().map_or(0, |m| m.active_key_count)
    }

    pub fn pending_print(&self) -> usize {
        self.machine.as_ref().map_or(0, |m| m.printout.len())
    }

    /// Loop volumes as [hum, spaces, chars]
    pub fn volumes(&self) -> [f32; 3] {
        self.machine
            .as_ref()
            .map_or([0.0; 3], |m| m.voices.map(|voice| voice.volume))
    }

    pub fn is_paused(&self, l: Loop) -> bool {
        self.machine
            .as_ref()
            .map_or(false, |m| m.voices[l.index()].paused)
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.machine
            .as_ref()
            .map_or(false, |m| m.timers.is_armed(kind))
    }

    pub fn mixer(&self) -> Option<&M> {
        self.machine.as_ref().map(|m| &m.mixer)
    }

    pub fn mixer_mut(&mut self) -> Option<&mut M> {
        self.machine.as_mut().map(|m| &mut m.mixer)
    }
}
