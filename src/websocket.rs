//! # Live Stream Session Controller
//!
//! Handles one WebSocket connection streaming call audio for live scam
//! analysis. Clients connect to `/ws/stream`, send binary WAV chunks, and
//! receive an evolving risk estimate while the call is still in progress.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: server sends `{"type": "connected"}` once
//! 2. **Streaming**: each binary message is one audio chunk; the server
//!    answers every processed chunk with a `partial_result`
//! 3. **Completion**: the client sends `{"type": "end_stream"}` (or the
//!    chunk cap is reached) and the server answers with one `final_result`
//! 4. **Errors**: recoverable per-chunk problems arrive as `error` messages
//!    without closing the connection; a receive timeout sends a terminal
//!    `error` and closes
//!
//! ## Ordering and concurrency:
//! One session maps to one actor and one logical sequential stream. Chunks
//! queue in arrival order and at most one scoring call is in flight, because
//! the running-score update is order-dependent. The scoring call runs on a
//! spawned task so control messages and the receive timeout stay live while
//! it is pending; an in-flight call is allowed to finish before finalizing,
//! but no new chunk intake begins after a terminal signal.

use crate::analysis::aggregator::{FinalResult, PartialResult, SessionPhase, StreamAggregator};
use crate::analysis::extract::extract_json;
use crate::analysis::normalize::normalize_analysis;
use crate::analysis::silence::is_silent;
use crate::auth::ApiKeys;
use crate::config::LimitsConfig;
use crate::demo;
use crate::schemas::AnalysisResult;
use crate::scoring::ScoringClient;
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often the session checks its receive deadline.
const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Messages the server sends over the stream.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connected")]
    Connected,

    #[serde(rename = "partial_result")]
    PartialResult(PartialResult),

    #[serde(rename = "final_result")]
    FinalResult(FinalResult),

    #[serde(rename = "error")]
    Error { detail: String },
}

/// Control messages the client may send as text frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientControl {
    #[serde(rename = "end_stream")]
    EndStream,
}

/// Result of one chunk's scoring pipeline, delivered back to the actor.
#[derive(Message)]
#[rtype(result = "()")]
struct ChunkScored(Result<AnalysisResult, String>);

/// Actor owning one live analysis session.
pub struct StreamSession {
    /// Session scoring state; mutated only from this actor
    aggregator: StreamAggregator,

    /// Resource limits for this session
    limits: LimitsConfig,

    /// Hosted model client; None runs the session in demo mode
    scorer: Option<Arc<ScoringClient>>,

    /// Shared state for session metrics
    app_state: web::Data<AppState>,

    /// Chunks waiting for the single in-flight scoring slot
    pending: VecDeque<web::Bytes>,

    /// Whether a scoring call is currently out
    in_flight: bool,

    /// Last time the client sent anything
    last_recv: Instant,

    /// Position in the scripted demo responses
    demo_cursor: usize,
}

impl StreamSession {
    pub fn new(
        aggregator: StreamAggregator,
        limits: LimitsConfig,
        scorer: Option<Arc<ScoringClient>>,
        app_state: web::Data<AppState>,
    ) -> Self {
        Self {
            aggregator,
            limits,
            scorer,
            app_state,
            pending: VecDeque::new(),
            in_flight: false,
            last_recv: Instant::now(),
            demo_cursor: 0,
        }
    }

    /// Best-effort send; a failure to serialize is a bug worth a log line
    /// but never a crash.
    fn send_message(&self, ctx: &mut ws::WebsocketContext<Self>, message: ServerMessage) {
        match serde_json::to_string(&message) {
            Ok(json) => ctx.text(json),
            Err(err) => error!("Failed to serialize stream message: {}", err),
        }
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, detail: String) {
        warn!("Stream session error: {}", detail);
        self.send_message(ctx, ServerMessage::Error { detail });
    }

    /// Accept one binary chunk into the session.
    fn handle_chunk(&mut self, data: web::Bytes, ctx: &mut ws::WebsocketContext<Self>) {
        if !self.aggregator.is_active() {
            debug!("Dropping chunk received after terminal signal");
            return;
        }

        if data.len() > self.limits.max_chunk_bytes {
            // Per-chunk failure: the counter does not advance and the
            // session stays open for subsequent valid chunks
            self.send_error(
                ctx,
                format!(
                    "Chunk too large: {} bytes (max {})",
                    data.len(),
                    self.limits.max_chunk_bytes
                ),
            );
            return;
        }

        let queued = self.aggregator.chunk_count() as usize + self.pending.len();
        if queued >= self.limits.max_chunks_per_session as usize {
            // Anything past the cap would never be processed anyway
            debug!("Dropping chunk beyond session cap");
            return;
        }

        self.pending.push_back(data);
        self.pump(ctx);
    }

    /// Drain queued chunks in order until a scoring call goes out or the
    /// session leaves the Active phase. Silent chunks resolve locally and
    /// never reach the model.
    fn pump(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        while !self.in_flight && self.aggregator.is_active() {
            let Some(chunk) = self.pending.pop_front() else {
                return;
            };

            if is_silent(&chunk, self.limits.silence_rms_threshold) {
                debug!("Silence gate skipped chunk {}", self.aggregator.chunk_count() + 1);
                let partial = self.aggregator.record_silent();
                self.send_message(ctx, ServerMessage::PartialResult(partial));

                if self.chunk_cap_reached() {
                    self.finalize(ctx);
                    return;
                }
            } else {
                self.dispatch_scoring(chunk, ctx);
            }
        }
    }

    /// Ship one chunk to the scoring pipeline on a spawned task.
    fn dispatch_scoring(&mut self, chunk: web::Bytes, ctx: &mut ws::WebsocketContext<Self>) {
        self.in_flight = true;

        match &self.scorer {
            Some(scorer) => {
                let scorer = scorer.clone();
                let addr = ctx.address();
                tokio::spawn(async move {
                    let outcome = score_chunk(&scorer, &chunk).await;
                    addr.do_send(ChunkScored(outcome));
                });
            }
            None => {
                // Demo mode: scripted results, same pipeline downstream
                let result = demo::scripted_chunk(self.demo_cursor);
                self.demo_cursor += 1;
                ctx.address().do_send(ChunkScored(Ok(result)));
            }
        }
    }

    fn chunk_cap_reached(&self) -> bool {
        self.aggregator.chunk_count() >= self.limits.max_chunks_per_session
    }

    fn handle_control(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::from_str::<ClientControl>(text) {
            Ok(ClientControl::EndStream) => {
                info!("Client requested end of stream");
                self.begin_finalizing(ctx);
            }
            Err(err) => {
                // Malformed control messages never affect session state
                warn!("Ignoring unparseable control message: {}", err);
            }
        }
    }

    /// Enter the Finalizing phase. Queued chunks are dropped; an in-flight
    /// scoring call is drained before the final result goes out.
    fn begin_finalizing(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if self.aggregator.phase() == SessionPhase::Closed {
            return;
        }

        self.aggregator.begin_finalizing();
        self.pending.clear();

        if !self.in_flight {
            self.finalize(ctx);
        }
    }

    /// Emit the final result and close the connection.
    fn finalize(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let final_result = self.aggregator.finalize();
        info!(
            total_chunks = final_result.total_chunks,
            combined_score = final_result.combined_score,
            verdict = final_result.verdict.as_str(),
            review_required = final_result.review_required,
            "Stream session finalized"
        );

        self.send_message(ctx, ServerMessage::FinalResult(final_result));
        ctx.close(Some(ws::CloseCode::Normal.into()));
        ctx.stop();
    }

    /// Liveness check: no client data within the receive timeout ends the
    /// session with a terminal error and no final result.
    fn check_receive_deadline(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if !self.aggregator.is_active() {
            return;
        }

        let deadline = Duration::from_secs(self.limits.receive_timeout_secs);
        if self.last_recv.elapsed() > deadline {
            self.send_error(
                ctx,
                format!(
                    "Receive timeout: no data within {}s; closing stream",
                    self.limits.receive_timeout_secs
                ),
            );
            ctx.close(Some(ws::CloseCode::Away.into()));
            ctx.stop();
        }
    }
}

/// Run one chunk through score -> extract -> normalize, flattening every
/// failure into a client-safe detail string.
async fn score_chunk(scorer: &ScoringClient, chunk: &[u8]) -> Result<AnalysisResult, String> {
    let raw = scorer
        .score_audio(chunk)
        .await
        .map_err(|err| format!("Chunk processing failed: {}", err))?;

    let value =
        extract_json(&raw).map_err(|err| format!("Chunk processing failed: {}", err))?;

    Ok(normalize_analysis(&value))
}

impl Actor for StreamSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Stream session started");
        self.app_state.increment_active_sessions();
        self.send_message(ctx, ServerMessage::Connected);

        ctx.run_interval(TIMEOUT_CHECK_INTERVAL, |act, ctx| {
            act.check_receive_deadline(ctx);
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("Stream session stopped");
        self.app_state.decrement_active_sessions();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for StreamSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Binary(data)) => {
                self.last_recv = Instant::now();
                self.handle_chunk(data, ctx);
            }
            Ok(ws::Message::Text(text)) => {
                self.last_recv = Instant::now();
                self.handle_control(&text, ctx);
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_recv = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_recv = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Stream closed by client: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!("WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

impl Handler<ChunkScored> for StreamSession {
    type Result = ();

    fn handle(&mut self, msg: ChunkScored, ctx: &mut Self::Context) {
        self.in_flight = false;

        if self.aggregator.phase() == SessionPhase::Closed {
            // Timed out or closed while the call was out; drop the result
            return;
        }

        match msg.0 {
            Ok(result) => {
                let partial = self.aggregator.record_scored(&result);
                self.send_message(ctx, ServerMessage::PartialResult(partial));
            }
            Err(detail) => {
                // One bad chunk must not poison the session: scores are
                // untouched and the loop keeps going
                self.send_error(ctx, detail);
            }
        }

        if self.chunk_cap_reached() || self.aggregator.phase() == SessionPhase::Finalizing {
            self.finalize(ctx);
        } else {
            self.pump(ctx);
        }
    }
}

/// HTTP -> WebSocket upgrade handler for `/ws/stream`.
pub async fn stream_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
    scorer: web::Data<Option<Arc<ScoringClient>>>,
    api_keys: web::Data<ApiKeys>,
) -> ActixResult<HttpResponse> {
    info!(
        "New stream connection from {:?}",
        req.connection_info().peer_addr()
    );

    // Browsers cannot set headers on WebSocket upgrades; the key rides in
    // the query string instead
    let query = web::Query::<std::collections::HashMap<String, String>>::from_query(
        req.query_string(),
    )
    .unwrap_or_else(|_| web::Query(std::collections::HashMap::new()));

    if !api_keys.verify_ws(query.get("api_key").map(String::as_str)) {
        warn!("Rejected stream connection with missing or invalid API key");
        return Ok(HttpResponse::Forbidden().finish());
    }

    let config = app_state.get_config();
    let aggregator = StreamAggregator::new(config.thresholds, config.aggregation);
    let session = StreamSession::new(
        aggregator,
        config.limits.clone(),
        scorer.get_ref().clone(),
        app_state,
    );

    ws::start(session, &req, stream)
}
