use std::io::{IsTerminal as _, Write as _};

use flux_ai_harness::{HarnessError, ModelRef, RunFailure, Session, StreamEvent};
use flux_core::{LiveAggregator, flatten_history};
use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthStr;

use crate::render;

pub const SYSTEM_PROMPT: &str = "\
- You are a friendly and knowledgeable assistant for a fantasy game based on Twitter influencers
- Your responses are concise, informative, and tailored to the user's query
- You can provide detailed information about heroes, cards, and players in the game
- When discussing trends or performance, you proactively offer to use visualization tools for better insights
- You can explain game mechanics and strategies to help players improve their performance
- If asked about predictions or future outcomes, you base your responses on available data and trends
- You maintain a positive and encouraging tone, especially when discussing player performance or game strategies";

/// One chat session: the harness session plus the aggregated transcript.
pub struct Chat {
    session: Session,
    model: ModelRef,
    max_tool_roundtrips: u32,
    aggregator: LiveAggregator,
    screen: Screen,
}

impl Chat {
    pub fn new(
        session: Session,
        model: ModelRef,
        max_tool_roundtrips: u32,
        aggregator: LiveAggregator,
    ) -> Self {
        Self {
            session,
            model,
            max_tool_roundtrips,
            aggregator,
            screen: Screen::new(std::io::stdout().is_terminal()),
        }
    }

    /// Sends one user message and drains the run into the transcript.
    /// Ctrl-C cancels the response in flight.
    pub async fn submit(&mut self, text: &str) -> Result<(), HarnessError> {
        let start = self.aggregator.settled_turns().len();
        let history = flatten_history(self.aggregator.settled_turns());
        info!(
            event = "chat.turn_submitted",
            history = history.len(),
            chars = text.chars().count()
        );

        let mut stream = self
            .session
            .run(self.model.clone())
            .system_prompt(SYSTEM_PROMPT)
            .history(history)
            .user_text(text)
            .max_tool_roundtrips(self.max_tool_roundtrips)
            .start_stream()
            .await?;
        let abort = stream.abort_handle();
        let run_id = stream.run_id();
        self.screen.begin();

        loop {
            let event = tokio::select! {
                event = stream.next_event() => event,
                _ = tokio::signal::ctrl_c() => {
                    debug!(event = "chat.cancel_requested", run_id = %run_id);
                    abort.abort();
                    continue;
                }
            };
            let terminal = match event {
                Some(event) => apply_event(&mut self.aggregator, event),
                None => {
                    if self.aggregator.is_streaming() {
                        self.aggregator.fail("response stream closed unexpectedly");
                    }
                    true
                }
            };
            self.screen
                .draw(&render::render_from(&self.aggregator.view(), start), terminal);
            if terminal {
                break;
            }
        }

        if let Err(err) = stream.finish().await {
            debug!(event = "chat.run_ended_with_error", error = %err);
        }
        Ok(())
    }

    pub fn aggregator(&self) -> &LiveAggregator {
        &self.aggregator
    }
}

/// Feeds one stream event into the aggregator. Returns whether the event
/// ends the exchange.
pub fn apply_event(aggregator: &mut LiveAggregator, event: StreamEvent) -> bool {
    match event {
        StreamEvent::RunStarted { run_id, model, .. } => {
            debug!(event = "chat.run_started", run_id = %run_id, model = %model);
            false
        }
        StreamEvent::Fragment { fragment, seq, .. } => {
            if !aggregator.push(fragment) {
                debug!(event = "chat.fragment_ignored", seq = seq);
            }
            false
        }
        StreamEvent::Finished { .. } => {
            aggregator.finish();
            true
        }
        StreamEvent::Error {
            error: RunFailure::Cancelled,
            ..
        } => {
            aggregator.cancel();
            true
        }
        StreamEvent::Error { error, .. } => {
            warn!(event = "chat.run_failed", error = %error);
            aggregator.fail(error.to_string());
            true
        }
    }
}

/// Redraws the block of the exchange in flight. Without a terminal only the
/// final frame is printed.
struct Screen {
    interactive: bool,
    drawn_lines: usize,
}

impl Screen {
    fn new(interactive: bool) -> Self {
        Self {
            interactive,
            drawn_lines: 0,
        }
    }

    fn begin(&mut self) {
        self.drawn_lines = 0;
    }

    fn draw(&mut self, frame: &str, last: bool) {
        if !self.interactive && !last {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        if self.interactive && self.drawn_lines > 0 {
            // Cursor to the start of the previous frame, then clear below.
            let _ = write!(stdout, "\x1b[{}F\x1b[J", self.drawn_lines);
        }
        let _ = write!(stdout, "{frame}");
        let _ = stdout.flush();
        self.drawn_lines = match crossterm::terminal::size() {
            Ok((columns, _)) => screen_rows(frame, columns),
            Err(_) => frame.lines().count(),
        };
    }
}

/// Terminal rows a frame occupies once long lines soft-wrap at `columns`.
fn screen_rows(frame: &str, columns: u16) -> usize {
    let columns = usize::from(columns.max(1));
    frame
        .lines()
        .map(|line| UnicodeWidthStr::width(line).div_ceil(columns).max(1))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_ai_harness::{ProviderId, RunOutput};
    use flux_core::{AggregatorConfig, Fragment};

    fn fragment(fragment: Fragment) -> StreamEvent {
        StreamEvent::Fragment {
            run_id: uuid::Uuid::nil(),
            seq: 0,
            fragment,
        }
    }

    fn aggregator() -> LiveAggregator {
        LiveAggregator::new(AggregatorConfig::default())
    }

    #[test]
    fn finished_event_completes_the_exchange() {
        let mut agg = aggregator();
        assert!(!apply_event(
            &mut agg,
            StreamEvent::RunStarted {
                run_id: uuid::Uuid::nil(),
                session_id: uuid::Uuid::nil(),
                provider: ProviderId::new("fake"),
                model: "m".into(),
            }
        ));
        assert!(!apply_event(&mut agg, fragment(Fragment::user("u", "hi"))));
        assert!(!apply_event(&mut agg, fragment(Fragment::assistant("a", "Hello"))));
        assert!(!agg.is_completed("a"));
        assert!(apply_event(
            &mut agg,
            StreamEvent::Finished {
                run_id: uuid::Uuid::nil(),
                output: RunOutput::default(),
            }
        ));
        assert!(agg.is_completed("a"));
        assert!(!agg.is_streaming());
    }

    #[test]
    fn cancelled_run_force_finalizes() {
        let mut agg = aggregator();
        apply_event(&mut agg, fragment(Fragment::user("u", "hi")));
        apply_event(&mut agg, fragment(Fragment::assistant("a", "Hel")));
        assert!(apply_event(
            &mut agg,
            StreamEvent::Error {
                run_id: uuid::Uuid::nil(),
                error: RunFailure::Cancelled,
            }
        ));
        assert!(agg.is_completed("a"));
        assert_eq!(agg.failure_for("a"), None);
    }

    #[test]
    fn upstream_failure_leaves_incomplete_turn_with_indicator() {
        let mut agg = aggregator();
        apply_event(&mut agg, fragment(Fragment::user("u", "hi")));
        apply_event(&mut agg, fragment(Fragment::assistant("a", "Hel")));
        apply_event(
            &mut agg,
            StreamEvent::Error {
                run_id: uuid::Uuid::nil(),
                error: RunFailure::Transport {
                    provider: "openai".into(),
                    message: "connection reset".into(),
                },
            },
        );
        assert!(!agg.is_completed("a"));
        assert_eq!(
            agg.failure_for("a"),
            Some("transport failure (openai): connection reset")
        );
        let last = agg.visible_turns().last().expect("turn");
        assert_eq!(last.content, "Hel");
    }

    #[test]
    fn wrapped_lines_count_every_screen_row() {
        let frame = format!("you> hi\nflux> {}\n\n", "x".repeat(24));
        assert_eq!(screen_rows(&frame, 10), 1 + 3 + 1);
        assert_eq!(screen_rows(&frame, 80), 3);
        assert_eq!(screen_rows("★★★★\n", 2), 2);
    }

    #[test]
    fn history_replays_only_settled_exchanges() {
        let mut agg = aggregator();
        apply_event(&mut agg, fragment(Fragment::user("u1", "hi")));
        apply_event(&mut agg, fragment(Fragment::assistant("a1", "Hello")));
        apply_event(
            &mut agg,
            StreamEvent::Finished {
                run_id: uuid::Uuid::nil(),
                output: RunOutput::default(),
            },
        );
        apply_event(&mut agg, fragment(Fragment::user("u2", "and now?")));
        let history = flatten_history(agg.settled_turns());
        let contents: Vec<&str> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "Hello"]);
    }
}
