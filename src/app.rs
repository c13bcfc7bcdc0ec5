//! Terminal application entry points.
//!
//! Wires the configuration, the HTTP client, the session driver, transcript
//! sources and the player into the CLI subcommands.

use crate::config::{Config, PlaybackConfig};
use crate::error::{AdvisorError, Result};
use crate::output::{
    JSON_NOTICE_VERBOSITY, clear_line, format_diagnosis, format_notice_json, format_status,
    render_notice, render_playback, should_render,
};
use crate::playback::player::Player;
#[cfg(feature = "cpal-audio")]
use crate::playback::{DurationSource, SpeakerNarration, decode_narration};
use crate::service::client::HttpAdvisorClient;
use crate::service::types::{
    DiagnosisResult, ImagePayload, Persona, Query, Slide, SlideImage, VideoAsset,
};
use crate::session::notice::SessionNotice;
use crate::session::orchestrator::{SessionDriver, SessionHandle};
use crate::session::state::{CycleId, Outcome, Session, SessionState, VideoState};
use crate::transcript::{CaptureEvent, CommandCapture, SpeechCapture, TextEntryCapture};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

fn client_for(config: &Config) -> Result<HttpAdvisorClient> {
    HttpAdvisorClient::new(&config.service.base_url, &config.service.device)
}

/// Render session notices on a dedicated thread until every sender is gone.
fn spawn_notice_renderer(
    quiet: bool,
    verbosity: u8,
) -> Result<(crossbeam_channel::Sender<SessionNotice>, JoinHandle<()>)> {
    let (tx, rx) = crossbeam_channel::unbounded::<SessionNotice>();
    let handle = thread::Builder::new()
        .name("notices".to_string())
        .spawn(move || {
            for notice in rx {
                if !should_render(&notice, quiet, verbosity) {
                    continue;
                }
                if verbosity >= JSON_NOTICE_VERBOSITY {
                    eprintln!("{}", format_notice_json(&notice));
                } else {
                    render_notice(&notice);
                }
            }
        })
        .map_err(|e| AdvisorError::Other(format!("Failed to start notice renderer: {e}")))?;
    Ok((tx, handle))
}

fn join_renderer(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        eprintln!("advisor: notice renderer panicked");
    }
}

fn start_session(
    config: &Config,
    persona: Persona,
    video: bool,
    quiet: bool,
    verbosity: u8,
) -> Result<(SessionHandle, tokio::task::JoinHandle<()>, JoinHandle<()>)> {
    let client = Arc::new(client_for(config)?);
    let (notice_tx, renderer) = spawn_notice_renderer(quiet, verbosity)?;
    let (handle, driver) = SessionDriver::new(client, Session::new(persona, video))
        .with_notices(notice_tx)
        .spawn();
    Ok((handle, driver, renderer))
}

async fn shutdown(handle: SessionHandle, driver: tokio::task::JoinHandle<()>, renderer: JoinHandle<()>) {
    drop(handle);
    if let Err(e) = driver.await {
        eprintln!("advisor: session loop ended abnormally: {e}");
    }
    join_renderer(renderer);
}

/// Run one diagnostic cycle: diagnose, then optionally fetch and play the video.
#[allow(clippy::too_many_arguments)]
pub async fn run_ask_command(
    config: Config,
    text: &str,
    persona: Option<Persona>,
    no_video: bool,
    play: bool,
    save_audio: Option<PathBuf>,
    save_page: Option<PathBuf>,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    let persona = persona.unwrap_or(config.session.persona);
    let query = Query::new(text, persona)?;
    let want_video = config.session.video && !no_video;
    let (handle, driver, renderer) = start_session(&config, persona, want_video, quiet, verbosity)?;

    if !quiet {
        eprintln!("Asking the {} advisor…", persona.label());
    }
    handle.submit(query).await?;
    let session = handle
        .wait_for(|s| {
            matches!(
                s.state(),
                SessionState::Ready { .. } | SessionState::Failed { .. }
            )
        })
        .await?;

    let outcome = match session.state() {
        SessionState::Failed { reason, .. } => Err(AdvisorError::Request(reason.clone())),
        SessionState::Ready { result, .. } => {
            print!("{}", format_diagnosis(result));
            let page = match save_page.as_deref() {
                Some(path) => save_page_image(result, path)
                    .await
                    .map(|written| report_saved("Page image", path, written, quiet)),
                None => Ok(()),
            };
            let session = handle
                .wait_for(|s| s.state().video().is_none_or(VideoState::is_settled))
                .await?;
            let video = match session.state().video_asset() {
                Some(asset) => {
                    finish_video(asset, &config.playback, play, save_audio.as_deref(), quiet).await
                }
                None => Ok(()),
            };
            page.and(video)
        }
        _ => Ok(()),
    };

    shutdown(handle, driver, renderer).await;
    outcome
}

async fn finish_video(
    asset: &VideoAsset,
    playback: &PlaybackConfig,
    play: bool,
    save_audio: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    if let Some(path) = save_audio {
        tokio::fs::write(path, &asset.narration).await?;
        report_saved("Narration", path, asset.narration.len(), quiet);
    }
    if play {
        play_to_end(asset, playback).await
    } else {
        if !quiet {
            eprintln!("{}", "Script:".bold());
            eprintln!("{}", asset.script);
        }
        Ok(())
    }
}

fn report_saved(what: &str, path: &Path, bytes: usize, quiet: bool) {
    if !quiet {
        eprintln!("{what} saved to {} ({bytes} bytes)", path.display());
    }
}

async fn save_image(image: Option<&ImagePayload>, what: &str, path: &Path) -> Result<usize> {
    let image = image.ok_or_else(|| AdvisorError::NoImage {
        what: what.to_string(),
    })?;
    tokio::fs::write(path, &image.bytes).await?;
    Ok(image.bytes.len())
}

/// Write the manual page image attached to a diagnosis. Returns the byte count.
pub async fn save_page_image(result: &DiagnosisResult, path: &Path) -> Result<usize> {
    save_image(result.visual_page.as_ref(), "page", path).await
}

/// Write a slide's inline image. Remote images are not fetched.
pub async fn save_slide_image(slide: &Slide, path: &Path) -> Result<usize> {
    let image = match &slide.image {
        Some(SlideImage::Inline(payload)) => Some(payload),
        _ => None,
    };
    save_image(image, "inline slide", path).await
}

/// Player for `asset`. The narration goes to the speaker when audio output is
/// enabled and available; otherwise the slides follow a silent clock.
fn open_player(asset: &VideoAsset, playback: &PlaybackConfig) -> Result<Player> {
    if playback.audio {
        #[cfg(feature = "cpal-audio")]
        match speaker_player(asset) {
            Ok(player) => return Ok(player),
            Err(e) => eprintln!("{} {e}; showing slides without sound", "Audio off:".yellow()),
        };
    }
    Player::new(asset).map_err(|e| AdvisorError::Playback {
        message: e.to_string(),
    })
}

#[cfg(feature = "cpal-audio")]
fn speaker_player(asset: &VideoAsset) -> Result<Player> {
    let decoded = decode_narration(&asset.narration)?;
    let speaker = SpeakerNarration::open(&decoded)?;
    Player::with_narration(asset, Box::new(speaker), DurationSource::Decoded).map_err(|e| {
        AdvisorError::Playback {
            message: e.to_string(),
        }
    })
}

/// Play the slides against the narration until the end or Ctrl+C.
async fn play_to_end(asset: &VideoAsset, playback: &PlaybackConfig) -> Result<()> {
    let mut player = open_player(asset, playback)?;
    if !player.play() {
        return Err(AdvisorError::Playback {
            message: "narration length is unknown".to_string(),
        });
    }
    let mut ticker = tokio::time::interval(Duration::from_millis(playback.tick_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let advance = player.tick();
                render_playback(player.timeline());
                if advance.completed {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                player.pause();
                break;
            }
        }
    }
    eprintln!();
    Ok(())
}

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Ask(String),
    Reset,
    Voice,
    Persona(Option<String>),
    Play,
    Pause,
    Rewind(Option<f64>),
    Seek(f64),
    Page(PathBuf),
    SlideImage(PathBuf),
    Retry,
    State,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Parse a line typed at the session prompt.
pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix(':') else {
        return ReplCommand::Ask(line.to_string());
    };
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    match name {
        "reset" | "r" => ReplCommand::Reset,
        "voice" | "v" => ReplCommand::Voice,
        "persona" => ReplCommand::Persona(arg.map(str::to_string)),
        "play" | "p" => ReplCommand::Play,
        "pause" => ReplCommand::Pause,
        "rewind" | "rw" => match arg.map(str::parse::<f64>) {
            None => ReplCommand::Rewind(None),
            Some(Ok(secs)) if secs.is_finite() && secs > 0.0 => ReplCommand::Rewind(Some(secs)),
            Some(_) => ReplCommand::Invalid(format!("invalid rewind seconds: {}", rest.trim())),
        },
        "seek" => match arg.map(parse_position) {
            Some(Some(t)) => ReplCommand::Seek(t),
            _ => ReplCommand::Invalid("usage: :seek <seconds|m:ss>".to_string()),
        },
        "page" => match arg {
            Some(path) => ReplCommand::Page(PathBuf::from(path)),
            None => ReplCommand::Invalid("usage: :page <file>".to_string()),
        },
        "slide" => match arg {
            Some(path) => ReplCommand::SlideImage(PathBuf::from(path)),
            None => ReplCommand::Invalid("usage: :slide <file>".to_string()),
        },
        "retry" => ReplCommand::Retry,
        "state" | "s" => ReplCommand::State,
        "help" | "h" | "?" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        other => ReplCommand::Invalid(format!("unknown command :{other}")),
    }
}

/// Seconds as `12.5` or `m:ss`.
fn parse_position(text: &str) -> Option<f64> {
    let value = match text.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: f64 = minutes.parse().ok()?;
            let seconds: f64 = seconds.parse().ok()?;
            minutes * 60.0 + seconds
        }
        None => text.parse().ok()?,
    };
    value.is_finite().then_some(value)
}

const REPL_HELP: &str = "\
Type a question to diagnose it. Commands:
  :voice            speak a question (or type it if no recognizer is set)
  :persona [name]   show or set Technical | Presenter | Instructor
  :play  :pause     control the explanatory video
  :rewind [secs]    jump back (default from config)
  :seek <t>         jump to seconds or m:ss
  :page <file>      save the manual page image of the diagnosis
  :slide <file>     save the current slide's image
  :retry            resend the query that failed
  :reset            clear the current diagnosis
  :state            show the session state
  :quit";

/// What the terminal has already shown for the live session.
#[derive(Default)]
struct SessionView {
    shown_cycle: Option<CycleId>,
    video_cycle: Option<CycleId>,
    player: Option<Player>,
}

impl SessionView {
    fn update(&mut self, session: &Session, playback: &PlaybackConfig, quiet: bool) {
        match session.state() {
            SessionState::Ready {
                cycle,
                result,
                video,
                ..
            } => {
                if self.shown_cycle != Some(*cycle) {
                    self.shown_cycle = Some(*cycle);
                    self.player = None;
                    clear_line();
                    print!("{}", format_diagnosis(result));
                }
                if let VideoState::Ready(asset) = video
                    && self.video_cycle != Some(*cycle)
                {
                    self.video_cycle = Some(*cycle);
                    match open_player(asset, playback) {
                        Ok(mut player) => {
                            if playback.autoplay {
                                player.play();
                            }
                            self.player = Some(player);
                        }
                        Err(e) => eprintln!("{} {e}", "Video unusable:".yellow()),
                    }
                }
            }
            SessionState::Failed { cycle, .. } => {
                if self.shown_cycle != Some(*cycle) {
                    self.shown_cycle = Some(*cycle);
                    self.player = None;
                    if !quiet {
                        eprintln!("{}", "Type :retry to send the same question again.".dimmed());
                    }
                }
            }
            SessionState::Capturing { .. } => {
                if let Some(player) = self.player.as_mut() {
                    player.pause();
                }
            }
            SessionState::Idle | SessionState::Diagnosing { .. } => {
                self.player = None;
            }
        }
    }
}

fn describe_session(session: &Session, view: &SessionView) -> String {
    let state = session.state();
    let mut line = format!("state: {}", state.name());
    if let Some(cycle) = state.cycle() {
        line.push_str(&format!(" {cycle}"));
    }
    if let Some(query) = state.query() {
        line.push_str(&format!(" \"{}\"", query.text()));
    }
    if let Some(video) = state.video() {
        line.push_str(&format!(", video: {}", video.name()));
    }
    line.push_str(&format!(", persona: {}", session.persona()));
    if let Some(player) = &view.player {
        let position = player.timeline().position();
        line.push_str(&format!(
            ", at {:.1}s of {:.1}s",
            position.elapsed_seconds, position.total_seconds
        ));
    }
    line
}

fn report_outcome(outcome: Outcome) {
    if let Outcome::Rejected(reason) = outcome {
        eprintln!("{} {reason}", "Not now:".yellow());
    }
}

/// Interactive session: typed or spoken questions, diagnosis cards, video playback.
pub async fn run_session_command(config: Config, quiet: bool, verbosity: u8) -> Result<()> {
    let persona = config.session.persona;
    let (handle, driver, renderer) =
        start_session(&config, persona, config.session.video, quiet, verbosity)?;

    let mut recognizer = if config.session.capture_command.trim().is_empty() {
        None
    } else {
        Some(CommandCapture::from_command_line(&config.session.capture_command)?)
    };
    let mut text_entry = TextEntryCapture::new();
    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();

    let mut state_rx = handle.subscribe();
    let mut view = SessionView::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(config.playback.tick_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    if !quiet {
        eprintln!(
            "{} {} {} {}",
            "advisor".bold(),
            crate::version_string().dimmed(),
            config.service.base_url.dimmed(),
            format!("({})", persona.label()).dimmed()
        );
        eprintln!("{}", "Type a question, :voice to speak, :help for commands.".dimmed());
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("advisor: failed to read input: {e}");
                        break;
                    }
                };
                if text_entry.is_active() && !line.trim_start().starts_with(':') {
                    text_entry.feed(&line);
                    continue;
                }
                let command = parse_command(&line);
                if command == ReplCommand::Quit {
                    break;
                }
                let capture: &mut dyn SpeechCapture = match recognizer.as_mut() {
                    Some(r) => r,
                    None => &mut text_entry,
                };
                handle_command(command, &handle, &mut view, capture, &capture_tx, &config).await?;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let session = state_rx.borrow_and_update().clone();
                view.update(&session, &config.playback, quiet);
            }
            Some(event) = capture_rx.recv() => {
                // A stop after :reset lands here with nothing left to cancel.
                let cancelled = event == CaptureEvent::Cancelled;
                let outcome = handle.capture_event(event).await?;
                if !cancelled {
                    report_outcome(outcome);
                }
            }
            _ = ticker.tick() => {
                if let Some(player) = view.player.as_mut()
                    && player.is_playing()
                {
                    let advance = player.tick();
                    render_playback(player.timeline());
                    if advance.completed {
                        eprintln!();
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Some(recognizer) = recognizer.as_mut() {
        recognizer.stop();
    }
    text_entry.stop();
    drop(state_rx);
    shutdown(handle, driver, renderer).await;
    Ok(())
}

async fn handle_command(
    command: ReplCommand,
    handle: &SessionHandle,
    view: &mut SessionView,
    capture: &mut dyn SpeechCapture,
    capture_tx: &mpsc::UnboundedSender<CaptureEvent>,
    config: &Config,
) -> Result<()> {
    match command {
        ReplCommand::Ask(text) => report_outcome(handle.submit_text(&text).await?),
        ReplCommand::Reset => {
            if capture.is_active() {
                capture.stop();
            }
            report_outcome(handle.reset().await?)
        }
        ReplCommand::Retry => report_outcome(handle.retry().await?),
        ReplCommand::Voice => {
            if capture.is_active() {
                capture.stop();
                return Ok(());
            }
            let outcome = handle.start_capture().await?;
            report_outcome(outcome);
            if outcome == Outcome::Applied {
                if let Err(e) = capture.start(capture_tx.clone()) {
                    eprintln!("{} {e}", "Capture failed:".yellow());
                    report_outcome(handle.capture_event(CaptureEvent::Cancelled).await?);
                } else {
                    eprintln!("{} {}", "Listening".cyan(), format!("({})", capture.name()).dimmed());
                }
            }
        }
        ReplCommand::Persona(None) => {
            let current = handle.snapshot().persona();
            for persona in Persona::ALL {
                let marker = if persona == current { "*" } else { " " };
                eprintln!("{marker} {:<11} {}", persona.to_string(), persona.label().dimmed());
            }
        }
        ReplCommand::Persona(Some(name)) => match name.parse::<Persona>() {
            Ok(persona) => {
                handle.set_persona(persona).await?;
                eprintln!("Persona set to {persona}");
            }
            Err(e) => eprintln!("{e}"),
        },
        ReplCommand::Play => match view.player.as_mut() {
            Some(player) => {
                if !player.play() {
                    eprintln!("Narration length is unknown; cannot play");
                }
            }
            None => eprintln!("{}", no_video_message(&handle.snapshot())),
        },
        ReplCommand::Pause => {
            if let Some(player) = view.player.as_mut() {
                player.pause();
                render_playback(player.timeline());
                eprintln!();
            }
        }
        ReplCommand::Rewind(seconds) => match view.player.as_mut() {
            Some(player) => {
                player.rewind(seconds.unwrap_or(config.playback.rewind_seconds));
                render_playback(player.timeline());
                if !player.is_playing() {
                    eprintln!();
                }
            }
            None => eprintln!("{}", no_video_message(&handle.snapshot())),
        },
        ReplCommand::Seek(t) => match view.player.as_mut() {
            Some(player) => {
                player.seek(t);
                render_playback(player.timeline());
                if !player.is_playing() {
                    eprintln!();
                }
            }
            None => eprintln!("{}", no_video_message(&handle.snapshot())),
        },
        ReplCommand::Page(path) => {
            let session = handle.snapshot();
            match session.state().result() {
                Some(result) => match save_page_image(result, &path).await {
                    Ok(written) => report_saved("Page image", &path, written, false),
                    Err(e) => eprintln!("{e}"),
                },
                None => eprintln!("No diagnosis yet"),
            }
        }
        ReplCommand::SlideImage(path) => match view.player.as_ref() {
            Some(player) => match save_slide_image(player.current_slide(), &path).await {
                Ok(written) => report_saved("Slide image", &path, written, false),
                Err(e) => eprintln!("{e}"),
            },
            None => eprintln!("{}", no_video_message(&handle.snapshot())),
        },
        ReplCommand::State => eprintln!("{}", describe_session(&handle.snapshot(), view)),
        ReplCommand::Help => eprintln!("{REPL_HELP}"),
        ReplCommand::Invalid(message) => eprintln!("{message}"),
        ReplCommand::Empty | ReplCommand::Quit => {}
    }
    Ok(())
}

fn no_video_message(session: &Session) -> &'static str {
    match session.state().video() {
        Some(VideoState::Pending) => "Video is still being generated",
        Some(VideoState::Failed(_)) => "Video unavailable for this diagnosis",
        Some(VideoState::Skipped) => "Video generation is disabled",
        _ => "No video yet",
    }
}

/// Show manual registry status, optionally polling.
pub async fn run_status_command(config: Config, watch: bool, interval: Option<Duration>) -> Result<()> {
    let client = client_for(&config)?;
    let interval =
        interval.unwrap_or_else(|| Duration::from_secs(config.status.poll_interval_secs));
    loop {
        match client.status().await {
            Ok(status) => print!("{}", format_status(&status)),
            Err(e) if watch => eprintln!("{} {e}", "Status unavailable:".yellow()),
            Err(e) => return Err(e),
        }
        if !watch {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => println!(),
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Upload a PDF manual.
pub async fn run_upload_command(config: Config, path: &Path) -> Result<()> {
    let receipt = client_for(&config)?.upload(path).await?;
    let name = receipt
        .filename
        .clone()
        .unwrap_or_else(|| path.display().to_string());
    println!("{} {name}", "Uploaded".green());
    if let Some(message) = receipt.message {
        println!("{}", message.dimmed());
    }
    Ok(())
}

/// Ask the service to re-read its manuals.
pub async fn run_ingest_command(config: Config) -> Result<()> {
    let ack = client_for(&config)?.ingest().await?;
    println!("{}", ack.status.green());
    if let Some(message) = ack.message {
        println!("{}", message.dimmed());
    }
    Ok(())
}

/// Print the narration script for a question without generating audio.
pub async fn run_script_command(config: Config, text: &str, persona: Option<Persona>) -> Result<()> {
    let query = Query::new(text, persona.unwrap_or(config.session.persona))?;
    let script = client_for(&config)?.generate_script(&query).await?;
    println!("{script}");
    Ok(())
}

/// Report whether a diagnosis helped.
pub async fn run_feedback_command(config: Config, result: &str, comment: Option<&str>) -> Result<()> {
    let ack = client_for(&config)?.send_feedback(result, comment).await?;
    println!("{} {}", "Feedback sent:".green(), ack.status);
    Ok(())
}
