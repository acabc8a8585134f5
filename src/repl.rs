//! Interactive terminal chat
//!
//! A line-oriented loop over the orchestrator. Plain lines are routed through
//! the classifier (or straight to a pinned agent); slash commands inspect and
//! steer the session. Ctrl-C abandons the in-flight request; Ctrl-D or `/exit`
//! ends the session.

use crate::agents::{AgentRequest, ConversationTurn};
use crate::router::{Orchestrator, RouteResponse};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Turns of history sent along with each request
const MAX_HISTORY_TURNS: usize = 20;

const HELP: &str = "Commands: /agents, /use <agent>, /auto, /history, /exit. \
                    Anything else is sent to the office.";
const GOODBYE: &str = "Goodbye! Remember: identity theft is not a joke.";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Agents,
    Use(String),
    Auto,
    History,
    Help,
    Exit,
    Message(String),
    Empty,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Message(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match (name, arg) {
            ("agents", _) => ReplCommand::Agents,
            ("use", "") => ReplCommand::Unknown(line.to_string()),
            ("use", agent) => ReplCommand::Use(agent.to_string()),
            ("auto", _) => ReplCommand::Auto,
            ("history", _) => ReplCommand::History,
            ("help", _) => ReplCommand::Help,
            ("exit" | "quit", _) => ReplCommand::Exit,
            _ => ReplCommand::Unknown(line.to_string()),
        }
    }
}

/// What the loop does after a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Print(String),
    Exit(String),
}

/// One terminal chat session
pub struct Repl {
    orchestrator: Arc<Orchestrator>,
    session_id: String,
    pinned: Option<String>,
    history: Vec<ConversationTurn>,
}

impl Repl {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            session_id: format!("session_{}", uuid::Uuid::new_v4()),
            pinned: None,
            history: Vec::new(),
        }
    }

    /// Agent every message goes to, when pinned with `/use`
    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Handle one line; routing is abandoned if `cancel` completes first
    pub async fn execute<F>(&mut self, line: &str, cancel: F) -> Step
    where
        F: Future<Output = ()>,
    {
        match ReplCommand::parse(line) {
            ReplCommand::Empty => Step::Print(String::new()),
            ReplCommand::Exit => Step::Exit(GOODBYE.to_string()),
            ReplCommand::Help => Step::Print(HELP.to_string()),
            ReplCommand::Unknown(command) => {
                Step::Print(format!("Unknown command '{}'. {}", command, HELP))
            }
            ReplCommand::Agents => Step::Print(self.list_agents()),
            ReplCommand::Use(name) => Step::Print(self.pin(&name)),
            ReplCommand::Auto => {
                self.pinned = None;
                Step::Print("Back to automatic routing.".to_string())
            }
            ReplCommand::History => Step::Print(self.render_history()),
            ReplCommand::Message(text) => Step::Print(self.send(text, cancel).await),
        }
    }

    /// Read lines from `input` until EOF or `/exit`, writing replies to `output`
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output
            .write_all(format!("Dunder Mifflin, this is Dunder. {}\n", HELP).as_bytes())
            .await?;

        loop {
            let prompt = format!("[{}] > ", self.pinned.as_deref().unwrap_or("AUTO"));
            output.write_all(prompt.as_bytes()).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let cancel = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            match self.execute(&line, cancel).await {
                Step::Print(text) if text.is_empty() => {}
                Step::Print(text) => output.write_all(format!("{}\n", text).as_bytes()).await?,
                Step::Exit(text) => {
                    output.write_all(format!("{}\n", text).as_bytes()).await?;
                    break;
                }
            }
        }

        output.flush().await
    }

    fn list_agents(&self) -> String {
        let snapshot = self.orchestrator.registry().snapshot();
        if snapshot.is_empty() {
            return crate::router::NO_AGENTS_AVAILABLE.to_string();
        }
        let lines: Vec<String> = snapshot
            .iter()
            .map(|agent| format!("  {}: {}", agent.name(), agent.descriptor().description))
            .collect();
        format!("Available agents:\n{}", lines.join("\n"))
    }

    fn pin(&mut self, name: &str) -> String {
        match self.orchestrator.registry().get(name) {
            Some(agent) => {
                let name = agent.name().to_string();
                let reply = format!("Now talking to {}. Use /auto to go back.", name);
                self.pinned = Some(name);
                reply
            }
            None => format!("Nobody named '{}' works here. Try /agents.", name),
        }
    }

    fn render_history(&self) -> String {
        if self.history.is_empty() {
            return "No conversation yet.".to_string();
        }
        self.history
            .iter()
            .map(|turn| match &turn.agent {
                Some(agent) => format!("{}: {}", agent, turn.content),
                None => format!("You: {}", turn.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn send<F>(&mut self, text: String, cancel: F) -> String
    where
        F: Future<Output = ()>,
    {
        let start = self.history.len().saturating_sub(MAX_HISTORY_TURNS);
        let request = AgentRequest::new(text.clone())
            .with_session(self.session_id.clone())
            .with_history(self.history[start..].to_vec());

        let routed = async {
            match &self.pinned {
                Some(agent) => self.orchestrator.dispatch_to(agent, &request).await,
                None => self.orchestrator.route(&request).await,
            }
        };
        let response: RouteResponse = tokio::select! {
            biased;
            _ = cancel => return "(cancelled)".to_string(),
            response = routed => response,
        };

        self.history.push(ConversationTurn::user(text));
        match &response.agent {
            Some(agent) if response.outcome.is_agent_reply() => {
                self.history
                    .push(ConversationTurn::agent(agent.clone(), response.content.clone()));
                format!("[{}] {}", agent, response.content)
            }
            _ => response.content,
        }
    }
}
