//! Clocked Run
//!
//! Restores a saved session at power-up, then drives the sequencer the
//! way the panel firmware does: a 1 ms control
//! loop feeding simulated panel inputs, and a 48 kHz sample tick in
//! between. An eighth-note clock at 120 BPM plays the melody for eight
//! seconds while the mutation knob sits at 40%.
//!
//! Run with: RUST_LOG=debug cargo run --example clocked_run

use blossom::prelude::*;

const SAMPLE_RATE: f32 = 48_000.0;
const SAMPLES_PER_MS: usize = 48;
/// Eighth notes at 120 BPM
const CLOCK_PERIOD_MS: u32 = 250;
const CLOCK_WIDTH_MS: u32 = 20;
const RUN_MS: u32 = 8_000;

/// Counts gate pulses on the primary output
#[derive(Default)]
struct Outputs {
    gate: bool,
    pulses: u32,
    pitch: f32,
}

impl OutputSink for Outputs {
    fn write_cv(&mut self, output: CvOut, volts: f32) {
        if output == CvOut::Pitch {
            self.pitch = volts;
        }
    }

    fn write_gate(&mut self, output: GateOut, high: bool) {
        if output == GateOut::Primary {
            if high && !self.gate {
                self.pulses += 1;
            }
            self.gate = high;
        }
    }
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Flash left behind by an earlier session
    let mut store = MemoryStore::new();
    let earlier = SequencerContext::new(
        SequencerConfig::new(SAMPLE_RATE).with_scale_index(4),
        Rng::from_seed(2024),
    )?;
    store.save(&earlier.settings())?;

    // Power-up: restore before the first clock
    let mut seq = SequencerContext::new(SequencerConfig::new(SAMPLE_RATE), Rng::from_entropy())?;
    let restored = seq.restore(&mut store);
    println!("Restored: {:?}", restored);

    let mut controller = Controller::default();
    let mut outputs = Outputs::default();

    println!("Scale: {}", seq.scale().name());
    let melody: Vec<String> = seq.sequence().active().iter().map(|n| n.to_string()).collect();
    println!("Melody: {}", melody.join(" "));

    let mut frame = ControlFrame::default();
    // Transpose centred, mutation 40%
    frame.knobs = [0.5, 0.0, 0.0, 0.4, 0.0];

    let mut mutations = 0;
    for now in 0..RUN_MS {
        frame.now_ms = now;
        frame.clock_jack = now % CLOCK_PERIOD_MS < CLOCK_WIDTH_MS;
        // Save once, a second in
        frame.channel = (1_000..1_010).contains(&now);

        let outcome = controller.poll(&mut seq, &frame, &mut store);
        if let Some(step) = outcome.step {
            let note = seq.current_note();
            println!(
                "{:>5} ms  step {:>2}  {:<4} {}",
                now,
                step.step,
                note.to_string(),
                if note.muted { "rest" } else { "" }
            );
            if let Some(slot) = step.mutated {
                mutations += 1;
                println!("          mutated step {} -> {}", slot, seq.sequence().get(slot));
            }
        }

        for _ in 0..SAMPLES_PER_MS {
            seq.render(&mut outputs);
        }
    }

    println!();
    println!("Gate pulses: {}", outputs.pulses);
    println!("Mutations: {}", mutations);
    println!("Last pitch: {:.3}V", outputs.pitch);
    if let Some(bytes) = store.bytes() {
        println!("Saved settings: {} bytes", bytes.len());
    }
    if let Ok(json) = seq.settings().to_json() {
        println!("Settings JSON: {} chars", json.len());
    }

    Ok(())
}
