use serde::Serialize;

use crate::db::ConversationTurn;
use crate::rag::RetrievalResult;

/// System instruction carrying the retrieved rules and precedents verbatim
pub fn judge_system_prompt(context: &RetrievalResult) -> String {
    let rules = if context.rules.is_empty() {
        "(none recorded)".to_string()
    } else {
        context.rules.join("\n")
    };
    let precedents = if context.precedents.is_empty() {
        "(none found)".to_string()
    } else {
        context.precedents.join("\n---\n")
    };

    format!(
        r#"You are an AI judge evaluating NPC behavior in a role-playing game.

NPC RULES:
{rules}

RELEVANT PAST SESSIONS:
{precedents}

Your task:
Evaluate the CURRENT conversation only.

Return ONLY valid JSON with EXACT fields:
overallTone (friendly | neutral | hostile)
inCharacter (true | false)
fairnessScore (integer 0-10)
escalationTooFast (true | false)
summary (string)

Do NOT include any explanation outside JSON."#
    )
}

/// Transcript with `[PLAYER]` / `[NPC]` markers; empty messages are skipped
pub fn render_transcript(turns: &[ConversationTurn]) -> String {
    let mut transcript = String::new();
    for turn in turns {
        if !turn.player_message.is_empty() {
            transcript.push_str("[PLAYER] ");
            transcript.push_str(&turn.player_message);
            transcript.push('\n');
        }
        if !turn.npc_response.is_empty() {
            transcript.push_str("[NPC] ");
            transcript.push_str(&turn.npc_response);
            transcript.push('\n');
        }
    }
    transcript
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JudgeUserPayload<'a> {
    session_id: &'a str,
    player_id: &'a str,
    npc_id: &'a str,
    conversation: String,
    rules: &'a [String],
}

/// User message: identifiers, transcript and rules as one JSON document
pub fn judge_user_payload(
    session_id: &str,
    player_id: &str,
    npc_id: &str,
    turns: &[ConversationTurn],
    rules: &[String],
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&JudgeUserPayload {
        session_id,
        player_id,
        npc_id,
        conversation: render_transcript(turns),
        rules,
    })
}
