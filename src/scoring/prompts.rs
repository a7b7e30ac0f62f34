//! Fixed instruction prompts for the hosted scoring model.
//!
//! Both prompts pin the exact JSON output schema the extraction and
//! normalization layers expect. Process-wide read-only state; loaded once,
//! never mutated.

/// Prompt sent alongside each audio chunk or uploaded recording.
pub const SCAM_AUDIO_PROMPT: &str = r#"You are a scam call detection expert. Analyze this phone call audio for scam indicators.

Evaluate the following dimensions:
1. URGENCY TACTICS: Does the caller create artificial time pressure?
2. AUTHORITY IMPERSONATION: Do they claim to be from a bank, government, tech support, etc.?
3. INFORMATION EXTRACTION: Do they ask for SSN, credit card, passwords, or personal data?
4. EMOTIONAL MANIPULATION: Do they use fear, excitement, or guilt?
5. VOCAL PATTERNS: Aggressive tone, scripted speech, call-center background noise?
6. KNOWN SCAM SCRIPTS: IRS threats, tech support fraud, romance scam, prize notification, etc.

Respond in this exact JSON format:
{
  "scam_score": <float 0.0 to 1.0>,
  "confidence": <float 0.0 to 1.0>,
  "verdict": "SAFE" | "SUSPICIOUS" | "LIKELY_SCAM" | "SCAM",
  "signals": [
    {"category": "<dimension>", "detail": "<what you detected>", "severity": "low" | "medium" | "high"}
  ],
  "transcript_summary": "<brief summary of what was said>",
  "recommendation": "<what the user should do>"
}"#;

/// Prompt sent ahead of a call transcript.
pub const SCAM_TEXT_PROMPT: &str = r#"You are a scam detection expert analyzing a phone call transcript.

Look for these scam indicators:
1. Requests for personal/financial information
2. Urgency or threats ("act now", "your account will be closed")
3. Impersonation of authority (IRS, bank, Microsoft, police)
4. Too-good-to-be-true offers (lottery wins, free money)
5. Unusual payment methods (gift cards, wire transfers, crypto)
6. Pressure to keep the call secret
7. Callback numbers that differ from official numbers

Respond in this exact JSON format:
{
  "scam_score": <float 0.0 to 1.0>,
  "confidence": <float 0.0 to 1.0>,
  "verdict": "SAFE" | "SUSPICIOUS" | "LIKELY_SCAM" | "SCAM",
  "signals": [
    {"category": "<indicator>", "detail": "<specific text evidence>", "severity": "low" | "medium" | "high"}
  ],
  "recommendation": "<what the user should do>"
}"#;
