use ch340_relay::core::{Channel, ControllerConfig, PulsePolicy};
use ch340_relay::relay::{PlaylistFile, PlaylistFormat, RelayController};
use ch340_relay::util::init_tracing;
use std::time::Duration;

fn main() {
    // Usage: playback [device] [playlist.csv] [--reset-pulse] [--verbose]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (flags, positional): (Vec<&String>, Vec<&String>) =
        args.iter().partition(|arg| arg.starts_with("--"));
    let device = positional.first().map(|s| s.to_string()).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let playlist = positional.get(1).map(|s| s.to_string());
    let reset_pulse = flags.iter().any(|arg| *arg == "--reset-pulse");

    init_tracing(flags.iter().any(|arg| *arg == "--verbose"));

    let mut config = ControllerConfig::for_device(device);
    if reset_pulse {
        config.sequencer.pulse = PulsePolicy::ResetPulse {
            settle: Duration::from_secs(1),
        };
        config.sequencer.release_on_finish = true;
    }

    println!("USB Serial CH340 - Relay control");
    println!("- Device: {}", config.device);
    println!("- Baud rate: {}", config.baud_rate);
    println!("- Pulse policy: {:?}", config.sequencer.pulse);

    let mut relay = match RelayController::open(config) {
        Ok(relay) => relay,
        Err(e) => {
            eprintln!("Failed to open relay board: {}", e);
            std::process::exit(1);
        }
    };

    match relay.query_status() {
        Ok(status) => {
            println!("\nStatus:");
            for (channel, level) in status {
                println!("  {}: {}", channel, level);
            }
        }
        Err(e) => eprintln!("Status query failed: {}", e),
    }

    match playlist {
        Some(path) => {
            let file = PlaylistFile::new(path, PlaylistFormat::default());
            match relay.play_file(&file) {
                Ok(report) => {
                    println!("\nPlayed {} entries in {:?}", report.played, report.elapsed);
                    for failure in &report.failures {
                        println!("  entry {} ({}) failed: {}", failure.index, failure.channel, failure.error);
                    }
                }
                Err(e) => eprintln!("Playback aborted: {}", e),
            }
        }
        None => {
            // Blink relay 1 once
            let channel = Channel::new(0);
            if let Err(e) = relay.set_relay(channel, true, Duration::from_secs(1)) {
                eprintln!("Failed to switch {}: {}", channel, e);
            }
            if let Err(e) = relay.set_relay(channel, false, Duration::from_millis(100)) {
                eprintln!("Failed to switch {}: {}", channel, e);
            }
        }
    }

    relay.close();
    println!("\nOperation complete.");
}
