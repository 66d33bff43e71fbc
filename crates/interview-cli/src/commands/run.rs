use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use interview_backend::{select_backend, GenerationBackend, ScriptedBackend};
use interview_core::config::{InterviewConfig, SurveyQuestion};
use interview_core::model::{Role, Session, SessionId, Stage, SurveyResponses};
use interview_core::storage::FileStore;
use interview_core::SystemClock;
use interview_engine::{visible_turns, Directive, EngineError, InterviewStateMachine};

use crate::context::{AppContext, Paths};

const QUIT_COMMAND: &str = "/quit";

#[derive(Args)]
pub struct RunArgs {
    /// Resume or start this session ID (default: a new random ID)
    #[arg(long)]
    pub session: Option<String>,

    /// Run as the configured test identity
    #[arg(long, conflicts_with = "session")]
    pub test: bool,

    /// Start the test identity over from the welcome screen
    #[arg(long)]
    pub retake: bool,

    /// Replay interviewer replies from a JSON script instead of calling a model
    #[arg(long)]
    pub scripted: Option<PathBuf>,
}

pub fn run(args: &RunArgs, paths: &Paths) -> Result<()> {
    let ctx = AppContext::load(paths)?;
    let store = Arc::new(ctx.open_store()?);
    let id = session_id(args, &ctx.config)?;
    let backend = backend(args, &ctx.config)?;
    let machine = InterviewStateMachine::new(
        &ctx.config,
        backend,
        store.clone(),
        Arc::new(SystemClock),
    )
    .context("Invalid interview configuration")?;

    let stored = store
        .load_session(&id)
        .with_context(|| format!("Failed to read saved state for {id}"))?;
    let mut session = machine.open_session(id, stored);
    if args.retake {
        machine.retake(&mut session)?;
    }
    tracing::info!("Session {} opened at stage {}", session.id, session.stage);

    let stdin = io::stdin();
    let mut term = Terminal {
        input: stdin.lock(),
        out: io::stdout(),
    };
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(drive(&machine, &store, &ctx.config, &mut session, &mut term))
}

fn session_id(args: &RunArgs, config: &InterviewConfig) -> Result<SessionId> {
    if let Some(id) = &args.session {
        return SessionId::parse(id.as_str()).context("Invalid --session");
    }
    if args.test {
        return SessionId::parse(config.interview.test_identity.as_str())
            .context("Invalid interview.test_identity");
    }
    Ok(SessionId::generate())
}

fn backend(args: &RunArgs, config: &InterviewConfig) -> Result<Arc<dyn GenerationBackend>> {
    if let Some(path) = &args.scripted {
        let scripted = ScriptedBackend::from_file(path)
            .with_context(|| format!("Failed to load script {}", path.display()))?;
        return Ok(Arc::new(scripted));
    }
    let var = config.backend.api_key_var();
    let key = std::env::var(var).with_context(|| format!("Set {var} to your API key"))?;
    Ok(Arc::from(select_backend(&config.backend, key)?))
}

struct Terminal<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    /// Prompt and read one line. `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.out)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }
}

async fn drive<R: BufRead, W: Write>(
    machine: &InterviewStateMachine,
    store: &FileStore,
    config: &InterviewConfig,
    session: &mut Session,
    term: &mut Terminal<R, W>,
) -> Result<()> {
    let mut history_shown = false;
    loop {
        store
            .save_session(session)
            .with_context(|| format!("Failed to save state for {}", session.id))?;

        let finished = match session.stage {
            Stage::Welcome => welcome(machine, session, term)?,
            Stage::Interview => {
                if !history_shown {
                    replay(machine, session, term)?;
                    history_shown = true;
                }
                interview_step(machine, session, term).await?
            }
            Stage::Survey => survey(machine, config, session, term)?,
            Stage::Completed => {
                term.say("")?;
                term.say(
                    "You have completed the interview and the survey. \
                     Your contribution is greatly appreciated!",
                )?;
                if session.is_test_identity {
                    term.say("Test identity: run with --test --retake to rehearse again.")?;
                } else {
                    term.say("You may now close this window.")?;
                }
                true
            }
        };
        if finished {
            break;
        }
    }
    store
        .save_session(session)
        .with_context(|| format!("Failed to save state for {}", session.id))?;
    if session.stage != Stage::Completed {
        term.say(&format!(
            "Progress saved. Resume with: interview run --session {}",
            session.id
        ))?;
    }
    Ok(())
}

/// Returns true when input ran out.
fn welcome<R: BufRead, W: Write>(
    machine: &InterviewStateMachine,
    session: &mut Session,
    term: &mut Terminal<R, W>,
) -> Result<bool> {
    term.say("Welcome!")?;
    term.say("")?;
    term.say("Thanks for taking part in this research project. It has two short parts:")?;
    term.say("  1. An interview with an AI interviewer (around 10-15 minutes).")?;
    term.say("  2. A quick survey with a few follow-up questions.")?;
    term.say(&format!(
        "Type {QUIT_COMMAND} at any point during the interview to end it early."
    ))?;
    term.say("")?;
    let prompt = "Do you consent to your anonymous answers being used for research? [y/N] ";
    let Some(answer) = term.ask(prompt)? else {
        return Ok(true);
    };
    let consent = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
    machine.acknowledge_welcome(session, consent)?;
    term.say("")?;
    term.say("Part 1: Interview")?;
    Ok(false)
}

fn replay<R: BufRead, W: Write>(
    machine: &InterviewStateMachine,
    session: &Session,
    term: &mut Terminal<R, W>,
) -> Result<()> {
    for turn in visible_turns(session, machine.registry()) {
        let speaker = match turn.role {
            Role::User => "You",
            _ => "Interviewer",
        };
        term.say(&format!("{speaker}: {}", turn.content))?;
    }
    Ok(())
}

async fn interview_step<R: BufRead, W: Write>(
    machine: &InterviewStateMachine,
    session: &mut Session,
    term: &mut Terminal<R, W>,
) -> Result<bool> {
    if session.transcript.is_empty() {
        write!(term.out, "Interviewer: ")?;
        let result = {
            let out = &mut term.out;
            machine.begin(session, stream_printer(out)).await
        };
        return settle(result, term);
    }

    let Some(line) = term.ask("You: ")? else {
        return Ok(true);
    };
    if line.trim() == QUIT_COMMAND {
        let result = machine.quit_early(session);
        return settle(result, term);
    }
    if line.trim().is_empty() {
        return Ok(false);
    }

    write!(term.out, "Interviewer: ")?;
    let result = {
        let out = &mut term.out;
        machine.submit_response(session, &line, stream_printer(out)).await
    };
    settle(result, term)
}

/// Print each newly arrived piece of the accumulated reply.
fn stream_printer<W: Write>(out: &mut W) -> impl FnMut(&str) + '_ {
    let mut printed = 0;
    move |accumulated: &str| {
        if let Some(fresh) = accumulated.get(printed..) {
            if write!(out, "{fresh}").and_then(|()| out.flush()).is_err() {
                tracing::debug!("stdout closed while streaming");
            }
        }
        printed = accumulated.len();
    }
}

/// Render the outcome of an interview action. Retryable failures are shown
/// and the loop continues.
fn settle<R: BufRead, W: Write>(
    result: Result<Directive, EngineError>,
    term: &mut Terminal<R, W>,
) -> Result<bool> {
    match result {
        Ok(Directive::Reply { .. }) => term.say("")?,
        Ok(Directive::InterviewClosed { message, .. }) => {
            term.say("")?;
            term.say(&message)?;
        }
        Ok(Directive::EndedEarly { message }) => term.say(&message)?,
        Ok(_) => {}
        Err(e) if e.is_retryable() => {
            term.say("")?;
            term.say(&format!("Something went wrong: {e}"))?;
            term.say("Your last answer was not recorded. Please send it again.")?;
        }
        Err(EngineError::EmptyInput) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(false)
}

fn survey<R: BufRead, W: Write>(
    machine: &InterviewStateMachine,
    config: &InterviewConfig,
    session: &mut Session,
    term: &mut Terminal<R, W>,
) -> Result<bool> {
    term.say("")?;
    term.say("Part 2: Survey")?;
    term.say(&format!(
        "Thank you {}, please answer a few final questions.",
        session.id
    ))?;

    let mut responses = SurveyResponses::new();
    for question in &config.survey.questions {
        let Some(answer) = ask_question(question, term)? else {
            return Ok(true);
        };
        responses.insert(question.id.as_str(), answer);
    }

    match machine.submit_survey(session, responses) {
        Ok(_) => term.say("Survey submitted! Thank you.")?,
        Err(e) if e.is_retryable() => {
            tracing::error!("Survey submission for {} failed: {e}", session.id);
            term.say(&format!("Saving your answers failed: {e}"))?;
            if term.ask("Press Enter to try again. ")?.is_none() {
                return Ok(true);
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(false)
}

fn ask_question<R: BufRead, W: Write>(
    question: &SurveyQuestion,
    term: &mut Terminal<R, W>,
) -> Result<Option<String>> {
    if question.is_free_text() {
        return term.ask(&format!("{} ", question.prompt));
    }
    term.say(&question.prompt)?;
    for (i, option) in question.options.iter().enumerate() {
        term.say(&format!("  {}) {option}", i + 1))?;
    }
    loop {
        let Some(answer) = term.ask(&format!("Choose 1-{}: ", question.options.len()))? else {
            return Ok(None);
        };
        let picked = answer
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| question.options.get(i));
        match picked {
            Some(option) => return Ok(Some(option.clone())),
            None => term.say("Please pick one of the listed numbers.")?,
        }
    }
}
