use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::SharedState;
use crate::answers::AnswerValue;
use crate::error::{ProtocolError, ProtocolResult};
use crate::flow::{Outcome, ViewState};

/// Reply to every `survey/*` method.
#[derive(Debug, Serialize)]
pub struct SurveyReply {
    /// Effect of the trigger; absent for `survey/state`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    pub view: ViewState,
}

/// Parameters for `survey/select`.
#[derive(Debug, Deserialize)]
pub struct SelectParams {
    /// Integer for scale questions, label for single-choice questions.
    pub value: Value,
}

/// Parameters for `survey/toggle`.
#[derive(Debug, Deserialize)]
pub struct ToggleParams {
    pub label: String,
}

/// Parameters for `survey/text`.
#[derive(Debug, Deserialize)]
pub struct TextParams {
    pub text: String,
}

/// Route survey methods to the orchestrator
pub async fn handle_survey_call(
    state: &SharedState,
    method: &str,
    params: Option<Value>,
) -> ProtocolResult<Value> {
    info!(method = %method, "Routing survey call");

    let flow = &state.orchestrator;
    let outcome = match method {
        "survey/state" => None,
        "survey/select" => {
            let params: SelectParams = parse_params(method, params)?;
            let value = select_value(method, params.value)?;
            Some(flow.select(value))
        }
        "survey/toggle" => {
            let params: ToggleParams = parse_params(method, params)?;
            Some(flow.toggle(&params.label))
        }
        "survey/text" => {
            let params: TextParams = parse_params(method, params)?;
            Some(flow.set_text(params.text))
        }
        "survey/submit" => Some(flow.submit().await),
        "survey/back" => Some(flow.back().await),
        _ => {
            return Err(ProtocolError::UnknownMethod {
                method: method.to_string(),
            })
        }
    };

    let reply = SurveyReply {
        outcome,
        view: flow.view(),
    };
    serde_json::to_value(reply).map_err(ProtocolError::Json)
}

/// Integers select a scale value; strings select a choice label.
fn select_value(method: &str, value: Value) -> ProtocolResult<AnswerValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(AnswerValue::Number)
            .ok_or_else(|| ProtocolError::InvalidParameters {
                method: method.to_string(),
                message: format!("{} is not an integer", n),
            }),
        Value::String(label) => Ok(AnswerValue::Label(label)),
        other => Err(ProtocolError::InvalidParameters {
            method: method.to_string(),
            message: format!("expected integer or string, got {}", other),
        }),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Option<Value>,
) -> ProtocolResult<T> {
    match params {
        Some(params) => {
            serde_json::from_value(params).map_err(|e| ProtocolError::InvalidParameters {
                method: method.to_string(),
                message: e.to_string(),
            })
        }
        None => Err(ProtocolError::InvalidParameters {
            method: method.to_string(),
            message: "Missing params".to_string(),
        }),
    }
}
