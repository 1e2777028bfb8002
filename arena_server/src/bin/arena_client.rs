// Interactive terminal client for the arena server.
//
// Usage: arena-client [--host HOST] [--port PORT]
//
// Reads moves (1-9), `Y`/`N` after a win, or `Q` from stdin, and renders
// the board and status lines as server messages arrive. Stdin is read on
// its own thread so the main loop can keep draining server messages while
// the player is thinking.

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use arena_protocol::{BoardSnapshot, ClientMessage, Mark, Position, ServerMessage};
use arena_server::client::ArenaClient;
use arena_server::logging::init_logging;
use clap::Parser;

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "arena-client", about = "Play tic-tac-toe on an arena server")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 9876)]
    port: u16,

    /// Log filter for client diagnostics.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// What the next line of input answers.
#[derive(Default)]
struct Prompt {
    mark: Option<Mark>,
    replay: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    let addr = format!("{}:{}", args.host, args.port);
    let mut client = match ArenaClient::connect(&addr) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("arena-client: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("Connected to {addr}. Enter 1-9 to move, Q to quit.");

    let (input_tx, input_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if input_tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut prompt = Prompt::default();
    loop {
        for message in client.poll() {
            render(&message, &mut prompt);
        }
        if client.is_closed() {
            println!("Server closed the connection.");
            return ExitCode::SUCCESS;
        }

        match input_rx.recv_timeout(INPUT_POLL_INTERVAL) {
            Ok(line) => {
                let Some(message) = interpret(&line, &mut prompt) else {
                    continue;
                };
                let leaving = matches!(message, ClientMessage::Quit | ClientMessage::Replay(false));
                if let Err(e) = client.send(&message) {
                    eprintln!("arena-client: {e}");
                    return ExitCode::FAILURE;
                }
                if leaving {
                    client.disconnect();
                    return ExitCode::SUCCESS;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                let _ = client.quit();
                client.disconnect();
                return ExitCode::SUCCESS;
            }
        }
    }
}

/// Turn one input line into a message, or explain why not.
fn interpret(line: &str, prompt: &mut Prompt) -> Option<ClientMessage> {
    match ClientMessage::parse(line) {
        ClientMessage::Quit => Some(ClientMessage::Quit),
        ClientMessage::Replay(again) if prompt.replay => {
            prompt.replay = false;
            Some(ClientMessage::Replay(again))
        }
        _ if prompt.replay => {
            println!("Please answer Y or N.");
            None
        }
        ClientMessage::Move(position) if prompt.mark.is_some() => Some(ClientMessage::Move(position)),
        ClientMessage::Move(_) => {
            println!("No game yet; waiting for an opponent.");
            None
        }
        _ => {
            println!("Enter a square from {} to {}, or Q.", Position::MIN, Position::MAX);
            None
        }
    }
}

fn render(message: &ServerMessage, prompt: &mut Prompt) {
    match message {
        ServerMessage::AssignMark(mark) => {
            prompt.mark = Some(*mark);
            println!("Game on! You are {mark}.");
        }
        ServerMessage::Waiting => println!("Waiting for an opponent..."),
        ServerMessage::QueuePosition(position) => {
            println!("You are number {} in the queue.", position.get());
        }
        ServerMessage::Board(snapshot) => {
            print_board(snapshot);
            if snapshot.your_turn {
                println!("Your move.");
            } else {
                println!("Waiting for your opponent...");
            }
        }
        ServerMessage::InvalidMove => println!("Invalid move, try again."),
        ServerMessage::Won(streak) => {
            prompt.mark = None;
            println!("You win! Streak: {}.", streak.get());
        }
        ServerMessage::Lost => {
            prompt.mark = None;
            println!("You lose.");
        }
        ServerMessage::Tie => {
            prompt.mark = None;
            println!("It's a tie.");
        }
        ServerMessage::ReplayPrompt => {
            prompt.replay = true;
            println!("Play again? (Y/N)");
        }
        ServerMessage::OpponentLeft => println!("Your opponent left."),
    }
}

fn print_board(snapshot: &BoardSnapshot) {
    let cell = |n: u8| match Position::new(n).and_then(|p| snapshot.cell(p)) {
        Some(mark) => mark.to_string(),
        None => n.to_string(),
    };
    for row in 0..3u8 {
        let base = row * 3;
        println!(" {} | {} | {}", cell(base + 1), cell(base + 2), cell(base + 3));
        if row < 2 {
            println!("---+---+---");
        }
    }
}
