use crate::error::Result;
use crate::services::controller::{ControllerStatus, StartRefused, TrackerController};
use std::fmt;
use std::io::BufRead;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const HELP: &str = "\
commands:
  connect          connect to Discord
  disconnect       stop tracking and disconnect
  start            start tracking the foreground application
  stop             stop tracking
  message <text>   set the status prefix (empty resets to the default)
  status           show connection and tracking state
  help             show this list
  quit             stop everything and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Start,
    Stop,
    Message(String),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command '{}', type 'help' for a list", self.0)
    }
}

impl ConsoleCommand {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, UnknownCommand> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let command = match word.to_lowercase().as_str() {
            "connect" => Self::Connect,
            "disconnect" => Self::Disconnect,
            "start" => Self::Start,
            "stop" => Self::Stop,
            "message" | "msg" => Self::Message(rest.to_string()),
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn render_status(status: &ControllerStatus) -> String {
    let connection = if status.connected { "Connected" } else { "Disconnected" };
    let tracking = if status.tracking { "running" } else { "stopped" };
    let message = if status.message.trim().is_empty() {
        "(default)"
    } else {
        status.message.trim()
    };
    let current = status
        .current
        .as_ref()
        .map_or_else(|| "-".to_string(), |change| change.display_name.clone());

    let mut rendered = format!(
        "Status: {}\nTracking: {}\nMessage: {}\nCurrent: {}",
        connection, tracking, message, current
    );
    if let Some(title) = status.current.as_ref().and_then(|change| change.activity.title.as_deref()) {
        rendered.push_str(&format!("\nWindow: {}", title));
    }
    rendered
}

/// Reads lines on a plain thread so a pending read never holds up runtime
/// shutdown. The thread ends at end of input or once the receiver is gone.
pub fn spawn_line_reader<R>(input: R) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Console input failed: {}", e);
                    break;
                }
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Line-oriented front end over a `TrackerController`.
pub struct Console<'a> {
    controller: &'a mut TrackerController,
}

impl<'a> Console<'a> {
    pub fn new(controller: &'a mut TrackerController) -> Self {
        Self { controller }
    }

    /// Returns the text to show, and whether the console should exit.
    pub async fn execute(&mut self, command: ConsoleCommand) -> (String, bool) {
        debug!("Console command: {:?}", command);
        match command {
            ConsoleCommand::Connect => {
                if self.controller.is_connected().await {
                    return ("Already connected".to_string(), false);
                }
                if self.controller.connect().await {
                    ("Connected to Discord".to_string(), false)
                } else {
                    ("Failed to connect to Discord".to_string(), false)
                }
            }
            ConsoleCommand::Disconnect => {
                self.controller.disconnect().await;
                ("Disconnected from Discord".to_string(), false)
            }
            ConsoleCommand::Start => match self.controller.start_tracking().await {
                Ok(()) => ("Started tracking applications".to_string(), false),
                Err(StartRefused::NotConnected) => ("Please connect to Discord first".to_string(), false),
                Err(StartRefused::Unavailable) => (
                    "Tracking crashed earlier and cannot restart, please relaunch".to_string(),
                    false,
                ),
            },
            ConsoleCommand::Stop => {
                self.controller.stop_tracking().await;
                ("Stopped tracking applications".to_string(), false)
            }
            ConsoleCommand::Message(text) => {
                self.controller.set_message(text.clone());
                if text.is_empty() {
                    ("Message reset to the default".to_string(), false)
                } else {
                    (format!("Message set to '{}'", text), false)
                }
            }
            ConsoleCommand::Status => (render_status(&self.controller.status().await), false),
            ConsoleCommand::Help => (HELP.to_string(), false),
            ConsoleCommand::Quit => {
                self.controller.shutdown().await;
                ("Bye".to_string(), true)
            }
        }
    }

    /// Reads commands until `quit` or end of input; always shuts the controller down.
    pub async fn run<W>(&mut self, mut input: mpsc::Receiver<String>, mut output: W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        output.write_all(format!("{}\n", HELP).as_bytes()).await?;

        loop {
            output.write_all(b"> ").await?;
            output.flush().await?;

            let Some(line) = input.recv().await else {
                info!("Console input closed");
                break;
            };

            let reply = match ConsoleCommand::parse(&line) {
                Ok(Some(command)) => {
                    let (reply, quit) = self.execute(command).await;
                    if quit {
                        output.write_all(format!("{}\n", reply).as_bytes()).await?;
                        output.flush().await?;
                        return Ok(());
                    }
                    reply
                }
                Ok(None) => continue,
                Err(e) => e.to_string(),
            };
            output.write_all(format!("{}\n", reply).as_bytes()).await?;
        }

        self.controller.shutdown().await;
        output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::presence::{PresenceReporter, ScriptedClient};
    use crate::services::tracker::tests::{tracker, ScriptedMonitor};

    fn controller(connect_ok: bool) -> (TrackerController, std::sync::Arc<parking_lot::Mutex<crate::services::presence::ClientLog>>) {
        let (client, log) = ScriptedClient::new(connect_ok);
        let tracker = tracker(ScriptedMonitor::names(&["chrome.exe"]), &[("chrome.exe", "Google Chrome")]);
        (
            TrackerController::new(tracker, PresenceReporter::new(Box::new(client)), "bro is doing"),
            log,
        )
    }

    fn lines(input: &str) -> mpsc::Receiver<String> {
        spawn_line_reader(std::io::Cursor::new(input.to_string()))
    }

    #[test]
    fn test_parse() {
        assert_eq!(ConsoleCommand::parse("  connect "), Ok(Some(ConsoleCommand::Connect)));
        assert_eq!(ConsoleCommand::parse("START"), Ok(Some(ConsoleCommand::Start)));
        assert_eq!(
            ConsoleCommand::parse("message  writing rust  "),
            Ok(Some(ConsoleCommand::Message("writing rust".to_string())))
        );
        assert_eq!(ConsoleCommand::parse("message"), Ok(Some(ConsoleCommand::Message(String::new()))));
        assert_eq!(ConsoleCommand::parse("exit"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(ConsoleCommand::parse("   "), Ok(None));
        assert_eq!(ConsoleCommand::parse("dance"), Err(UnknownCommand("dance".to_string())));
    }

    #[tokio::test]
    async fn test_start_before_connect_is_refused() {
        let (mut controller, _log) = controller(true);
        let mut console = Console::new(&mut controller);

        let (reply, quit) = console.execute(ConsoleCommand::Start).await;
        assert_eq!(reply, "Please connect to Discord first");
        assert!(!quit);
    }

    #[tokio::test]
    async fn test_failed_connect_is_reported() {
        let (mut controller, _log) = controller(false);
        let mut console = Console::new(&mut controller);

        let (reply, _) = console.execute(ConsoleCommand::Connect).await;
        assert_eq!(reply, "Failed to connect to Discord");
        let (status, _) = console.execute(ConsoleCommand::Status).await;
        assert!(status.contains("Status: Disconnected"));
        assert!(status.contains("Message: (default)"));
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let (mut controller, log) = controller(true);
        let input = lines("connect\nconnect\nmessage coding\nstart\nbogus\n\nstatus\nstop\nquit\nstatus\n");
        let mut output = Vec::new();

        Console::new(&mut controller).run(input, &mut output).await.unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("Connected to Discord"));
        assert!(output.contains("Already connected"));
        assert!(output.contains("Message set to 'coding'"));
        assert!(output.contains("Started tracking applications"));
        assert!(output.contains("unknown command 'bogus'"));
        assert!(output.contains("Status: Connected"));
        assert!(output.contains("Message: coding"));
        assert!(output.trim_end().ends_with("Bye"));

        assert!(!controller.is_tracking());
        assert!(!controller.is_connected().await);
        assert_eq!(log.lock().connects, 1);
        assert_eq!(log.lock().closes, 1);
    }

    #[tokio::test]
    async fn test_end_of_input_shuts_down() {
        let (mut controller, log) = controller(true);
        let input = lines("connect\nstart\n");

        Console::new(&mut controller).run(input, tokio::io::sink()).await.unwrap();

        assert!(!controller.is_tracking());
        assert!(!controller.is_connected().await);
        assert_eq!(log.lock().closes, 1);
    }

    #[tokio::test]
    async fn test_pending_input_does_not_block_cancellation() {
        let (mut controller, log) = controller(true);
        let (tx, rx) = mpsc::channel(1);
        tx.send("connect".to_string()).await.unwrap();

        // Input stays open and idle, like a terminal nobody types into.
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            Console::new(&mut controller).run(rx, tokio::io::sink()),
        )
        .await;
        assert!(waited.is_err());

        controller.shutdown().await;
        assert!(!controller.is_connected().await);
        assert_eq!(log.lock().closes, 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_line_reader_forwards_until_end_of_input() {
        let mut rx = lines("connect\r\nstatus\n");
        assert_eq!(rx.recv().await.as_deref(), Some("connect"));
        assert_eq!(rx.recv().await.as_deref(), Some("status"));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_status_shows_window_title() {
        let change = crate::events::ActivityChange::new(
            crate::events::ActivityInfo::new("chrome.exe").with_title("Inbox"),
            "Google Chrome".to_string(),
            true,
        );
        let status = ControllerStatus {
            connected: true,
            tracking: true,
            message: String::new(),
            current: Some(change),
        };
        let rendered = render_status(&status);
        assert!(rendered.contains("Current: Google Chrome"));
        assert!(rendered.ends_with("Window: Inbox"));
    }
}
