use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_REPORT_TITLE: &str = "Comprehensive Medical Synthesis";

const REFERENCE_RANGE_KEYS: &[&str] = &["reference_range", "referenceRange", "reference"];

/// Either one block of text or an ordered list of paragraph blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextBlocks {
    Text(String),
    Blocks(Vec<String>),
}

impl Default for TextBlocks {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl TextBlocks {
    pub fn blocks(&self) -> Vec<&str> {
        match self {
            Self::Text(text) if text.trim().is_empty() => Vec::new(),
            Self::Text(text) => vec![text.as_str()],
            Self::Blocks(blocks) => blocks.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks().is_empty()
    }

    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(text)) => Self::Text(text.clone()),
            Some(Value::Array(_)) => Self::Blocks(string_list(value)),
            Some(Value::Number(number)) => Self::Text(number.to_string()),
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ParameterStatus {
    Normal,
    High,
    Low,
    #[default]
    Unknown,
}

impl ParameterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl From<&str> for ParameterStatus {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normal" => Self::Normal,
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for ParameterStatus {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

/// One interpreted lab parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterReading {
    pub value: Option<f64>,
    pub unit: Option<String>,
    #[serde(default)]
    pub status: ParameterStatus,
    #[serde(default, alias = "reference", alias = "referenceRange")]
    pub reference_range: ReferenceRange,
}

impl ParameterReading {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let reference_range = REFERENCE_RANGE_KEYS
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_object))
            .map(|range| ReferenceRange {
                low: number_from(range.get("low")),
                high: number_from(range.get("high")),
            })
            .unwrap_or_default();
        Some(Self {
            value: number_from(obj.get("value")),
            unit: non_empty_string(obj.get("unit")),
            status: obj
                .get("status")
                .and_then(Value::as_str)
                .map(ParameterStatus::from)
                .unwrap_or_default(),
            reference_range,
        })
    }

    /// Position of the value on a gauge where `low` sits at 25% and `high` at 75%.
    ///
    /// The window extends half the reference span past each bound and the result
    /// is clamped to `[0, 100]`. Returns 50 when there is no usable range.
    pub fn range_position(&self) -> Option<f64> {
        let value = self.value?;
        let (Some(low), Some(high)) = (self.reference_range.low, self.reference_range.high) else {
            return Some(50.0);
        };
        if low == 0.0 || high == 0.0 {
            return Some(50.0);
        }
        let span = high - low;
        let min_disp = low - span * 0.5;
        let max_disp = high + span * 0.5;
        if max_disp == min_disp {
            return Some(50.0);
        }
        let pct = (value - min_disp) / (max_disp - min_disp) * 100.0;
        Some(pct.clamp(0.0, 100.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextAnalysis {
    pub analysis: String,
    pub adjusted_concerns: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    pub fn from_score(score: f64) -> Self {
        if score < 4.0 {
            Self::Low
        } else if score < 7.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

/// Body of a `POST /analyze` response.
///
/// Every field is optional on the wire. `parse` reads each field on its own and
/// degrades anything missing or malformed to its default instead of rejecting
/// the whole response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeResponse {
    pub analysis_type: Option<String>,
    pub risk_score: Option<f64>,
    pub risk_rationale: TextBlocks,
    pub patterns: Vec<String>,
    pub param_interpretation: IndexMap<String, ParameterReading>,
    pub synthesis_report: TextBlocks,
    pub recommendations: Vec<String>,
    pub context_analysis: Option<ContextAnalysis>,
    pub rag_collection_name: Option<String>,
    pub errors: Vec<String>,
}

impl AnalyzeResponse {
    pub fn parse(body: &str) -> Result<Self, String> {
        let payload: Value =
            serde_json::from_str(body).map_err(|err| format!("body is not JSON: {err}"))?;
        let Some(obj) = payload.as_object() else {
            return Err("body is not a JSON object".to_string());
        };
        Ok(Self::from_object(obj))
    }

    pub fn from_object(obj: &Map<String, Value>) -> Self {
        let mut param_interpretation = IndexMap::new();
        if let Some(params) = obj.get("param_interpretation").and_then(Value::as_object) {
            for (name, row) in params {
                if let Some(reading) = ParameterReading::from_value(row) {
                    param_interpretation.insert(name.clone(), reading);
                }
            }
        }

        let context_analysis = obj
            .get("context_analysis")
            .and_then(Value::as_object)
            .and_then(|ctx| {
                let analysis = non_empty_string(ctx.get("analysis"))?;
                Some(ContextAnalysis {
                    analysis,
                    adjusted_concerns: non_empty_string(ctx.get("adjusted_concerns")),
                })
            });

        Self {
            analysis_type: non_empty_string(obj.get("analysis_type")),
            risk_score: number_from(obj.get("risk_score")),
            risk_rationale: TextBlocks::from_value(obj.get("risk_rationale")),
            patterns: string_list(obj.get("patterns")),
            param_interpretation,
            synthesis_report: TextBlocks::from_value(obj.get("synthesis_report")),
            recommendations: string_list(obj.get("recommendations")),
            context_analysis,
            rag_collection_name: non_empty_string(obj.get("rag_collection_name")),
            errors: string_list(obj.get("errors")),
        }
    }
}

/// A normalized report. Built in one step from a response and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub report_title: String,
    pub filename: String,
    pub created_at: String,
    pub risk_score: f64,
    pub risk_rationale: TextBlocks,
    pub detected_patterns: Vec<String>,
    pub parameter_interpretation: IndexMap<String, ParameterReading>,
    pub synthesis_report: TextBlocks,
    pub recommendations: Vec<String>,
    pub context_analysis: Option<ContextAnalysis>,
    pub rag_collection_reference: Option<String>,
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    /// Partial-success policy: the server's `errors` become warnings and every
    /// extracted field is kept.
    pub fn from_response(response: AnalyzeResponse, filename: impl Into<String>) -> Self {
        Self {
            report_title: report_title(response.analysis_type.as_deref()),
            filename: filename.into(),
            created_at: now_utc_iso(),
            risk_score: response.risk_score.unwrap_or(0.0),
            risk_rationale: response.risk_rationale,
            detected_patterns: response.patterns,
            parameter_interpretation: response.param_interpretation,
            synthesis_report: response.synthesis_report,
            recommendations: response.recommendations,
            context_analysis: response.context_analysis,
            rag_collection_reference: response
                .rag_collection_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            warnings: response.errors,
        }
    }

    pub fn collection_reference(&self) -> Option<&str> {
        self.rag_collection_reference
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_score(self.risk_score)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn abnormal_parameters(&self) -> impl Iterator<Item = (&str, &ParameterReading)> {
        self.parameter_interpretation
            .iter()
            .filter(|(_, reading)| reading.status.is_abnormal())
            .map(|(name, reading)| (name.as_str(), reading))
    }
}

/// `"liver_function"` becomes `"liver function Analysis"`.
pub fn report_title(analysis_type: Option<&str>) -> String {
    match analysis_type.filter(|value| !value.is_empty()) {
        Some(kind) => format!("{} Analysis", kind.replace('_', " ")),
        None => DEFAULT_REPORT_TITLE.to_string(),
    }
}

fn number_from(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(raw) => raw.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(|row| match row {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Number(number) => Some(number.to_string()),
                Value::Bool(flag) => Some(flag.to_string()),
                _ => None,
            })
            .filter(|text| !text.is_empty())
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
        _ => Vec::new(),
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
