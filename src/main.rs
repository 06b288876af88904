//! Headless jog console
//!
//! Connects to the preferred (or first) attached controller and reads jog
//! commands from stdin. Connection events are printed as they arrive.

use anyhow::{bail, Context};
use cncjog::{
    init_logging, AutoGrantBroker, Axis, Config, ConnectionEvent, ConnectionManager, ConsoleLine,
    JogListener, JogSession, SerialDriver, SystemSerialDriver, VirtualSerialDriver, BUILD_DATE,
    VERSION,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::SplitWhitespace;
use std::sync::Arc;
use std::thread;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

const USAGE: &str = "usage: cncjog [--virtual] [CONFIG_FILE]";

const HELP: &str = "\
commands:
  jog <x|y|z|s> <step>   relative jog, or spindle speed change for s
  move <angle> <power>   joystick sample (angle in degrees, power 0..1)
  zero                   make the current position the work origin
  status                 show connection and position
  list                   list attached devices
  connect                connect to the preferred or first device
  disconnect             close the connection
  quit                   exit";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config_path: Option<PathBuf>,
    use_virtual: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options::default();
    for arg in args {
        match arg.as_str() {
            "--virtual" => options.use_virtual = true,
            "-h" | "--help" => bail!("{}", USAGE),
            flag if flag.starts_with('-') => bail!("unknown option {}\n{}", flag, USAGE),
            path if options.config_path.is_none() => options.config_path = Some(path.into()),
            extra => bail!("unexpected argument {}\n{}", extra, USAGE),
        }
    }
    Ok(options)
}

#[derive(Debug, PartialEq)]
enum Command {
    Jog(Axis, f64),
    Move(f64, f64),
    Zero,
    Status,
    List,
    Connect,
    Disconnect,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let command = match word.to_ascii_lowercase().as_str() {
        "jog" => {
            let axis = next_word(&mut words, "axis")?.parse::<Axis>()?;
            Command::Jog(axis, next_number(&mut words, "step")?)
        }
        "move" => {
            let angle = next_number(&mut words, "angle")?;
            Command::Move(angle, next_number(&mut words, "power")?)
        }
        "zero" => Command::Zero,
        "status" => Command::Status,
        "list" => Command::List,
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(Some(command))
}

fn next_word<'a>(words: &mut SplitWhitespace<'a>, name: &str) -> Result<&'a str, String> {
    words.next().ok_or_else(|| format!("missing {}", name))
}

fn next_number(words: &mut SplitWhitespace<'_>, name: &str) -> Result<f64, String> {
    let text = next_word(words, name)?;
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("invalid {}: {}", name, text))
}

/// Print connection events until the dispatcher goes away
fn spawn_event_printer(mut events: broadcast::Receiver<ConnectionEvent>) -> io::Result<()> {
    thread::Builder::new()
        .name("cncjog-events".to_string())
        .spawn(move || loop {
            match events.blocking_recv() {
                Ok(event) => {
                    if let Some(line) = ConsoleLine::from_event(&event) {
                        println!("{}", line.formatted_with_time());
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        })
        .map(|_| ())
}

fn run_command(session: &mut JogSession, config: &Config, command: Command) {
    match command {
        Command::Jog(axis, step) => session.on_jog(axis, step),
        Command::Move(angle, power) => session.on_move(angle, power.clamp(0.0, 1.0)),
        Command::Zero => session.zero_origin(),
        Command::Status => println!("{}", session.status_text()),
        Command::List => {
            for device in session.candidates() {
                println!("{}  {}", device.port_name, device.display_name());
            }
        }
        Command::Connect => {
            if !session.connect_preferred(&config.connection) && !session.status().connected {
                println!("Not connected");
            }
        }
        Command::Disconnect => session.disconnect(),
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let options = parse_args(std::env::args().skip(1))?;
    info!("CNC Jogger {} (built {})", VERSION, BUILD_DATE);

    let config = Config::load_or_default(options.config_path.as_deref())
        .context("Failed to load configuration")?;

    let driver: Arc<dyn SerialDriver> = if options.use_virtual {
        let driver = VirtualSerialDriver::new();
        driver.set_echo_ok(true);
        Arc::new(driver)
    } else {
        Arc::new(SystemSerialDriver::new())
    };
    let manager = ConnectionManager::new(driver, Arc::new(AutoGrantBroker));
    spawn_event_printer(manager.subscribe()).context("Failed to start event printer")?;

    let mut session = JogSession::new(manager.clone(), config.session.clone());
    run_command(&mut session, &config, Command::List);
    run_command(&mut session, &config, Command::Connect);

    let stdin = io::stdin();
    let mut input = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        match parse_command(&input) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => run_command(&mut session, &config, command),
            Ok(None) => {}
            Err(message) => println!("{} (type 'help')", message),
        }
        session.poll_events();
    }

    manager.shutdown();
    Ok(())
}
