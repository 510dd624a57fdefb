use std::time::Duration;

use anyhow::{Result, anyhow};

/// A host action in a simulation script
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostCommand {
    Play,
    Pause,
    Seek(f64),
    /// Seek relative to the current position
    Skip(f64),
    Restart,
    Wait(Duration),
}

/// Parse a script such as `"wait 5; seek 300; pause; wait 2; play"`
pub fn parse_script(script: &str) -> Result<Vec<HostCommand>> {
    script
        .split(|c| c == ';' || c == '\n')
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .map(parse_command)
        .collect()
}

/// Parse a single command
pub fn parse_command(command_str: &str) -> Result<HostCommand> {
    let parts: Vec<&str> = command_str.trim().splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim());

    let seconds = |name: &str| -> Result<f64> {
        let args = args.ok_or_else(|| anyhow!("{} command requires a seconds argument", name))?;
        let value = args
            .parse::<f64>()
            .map_err(|_| anyhow!("Invalid seconds for {}: {}", name, args))?;
        if !value.is_finite() {
            return Err(anyhow!("Invalid seconds for {}: {}", name, args));
        }
        Ok(value)
    };

    match cmd.as_str() {
        "play" | "p" => Ok(HostCommand::Play),
        "pause" => Ok(HostCommand::Pause),
        "seek" | "s" => {
            let position = seconds("seek")?;
            if position < 0.0 {
                return Err(anyhow!("Seek position must not be negative"));
            }
            Ok(HostCommand::Seek(position))
        }
        "skip" | "ff" => Ok(HostCommand::Skip(seconds("skip")?)),
        "restart" => Ok(HostCommand::Restart),
        "wait" | "w" => {
            let secs = seconds("wait")?;
            if secs < 0.0 {
                return Err(anyhow!("Wait must not be negative"));
            }
            let duration = Duration::try_from_secs_f64(secs)
                .map_err(|e| anyhow!("Invalid wait of {}s: {}", secs, e))?;
            Ok(HostCommand::Wait(duration))
        }
        _ => Err(anyhow!("Unknown command: {}", cmd)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let steps = parse_script("wait 5; seek 300\n pause;wait 0.5; PLAY; ff -10").unwrap();
        assert_eq!(
            steps,
            vec![
                HostCommand::Wait(Duration::from_secs(5)),
                HostCommand::Seek(300.0),
                HostCommand::Pause,
                HostCommand::Wait(Duration::from_millis(500)),
                HostCommand::Play,
                HostCommand::Skip(-10.0),
            ]
        );
    }

    #[test]
    fn test_rejects_bad_steps() {
        assert!(parse_command("seek").is_err());
        assert!(parse_command("seek -4").is_err());
        assert!(parse_command("wait soon").is_err());
        assert!(parse_command("rewind 3").is_err());
        assert!(parse_command("wait 1e300").is_err());
    }
}
