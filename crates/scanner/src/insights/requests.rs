use super::InsightRequest;
use crate::db::TrackingMetrics;
use anyhow::{ensure, Result};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

fn ensure_score(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && (0.0..=100.0).contains(&value),
        "{name} out of range: {value}"
    );
    Ok(())
}

fn ensure_fraction(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && (0.0..=1.0).contains(&value),
        "{name} out of range: {value}"
    );
    Ok(())
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub struct SiteScanRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteScanInsight {
    pub score: f64,
    /// Usually plain strings, but models sometimes return structured entries.
    #[serde(default)]
    pub recommendations: Vec<serde_json::Value>,
}

const SITE_SCAN_FALLBACK_RECOMMENDATIONS: [&str; 5] = [
    "Improve content structure with clear headings",
    "Add FAQ sections for common questions",
    "Optimize metadata (title tags, descriptions)",
    "Implement schema markup for better AI understanding",
    "Use more natural, conversational language",
];

impl InsightRequest for SiteScanRequest {
    type Payload = SiteScanInsight;

    fn prompt(&self) -> String {
        format!(
            "Analyze this website URL for AI Engine Optimization (AEO): {}\n\
             Provide a JSON response with: score (0-100) and recommendations array.",
            self.url
        )
    }

    fn validate(&self, payload: &SiteScanInsight) -> Result<()> {
        ensure_score("score", payload.score)
    }

    fn fallback(&self, _rng: &mut dyn RngCore) -> SiteScanInsight {
        SiteScanInsight {
            score: 50.0,
            recommendations: SITE_SCAN_FALLBACK_RECOMMENDATIONS
                .iter()
                .map(|recommendation| serde_json::Value::from(*recommendation))
                .collect(),
        }
    }
}

pub struct CompetitorComparisonRequest {
    pub user_url: String,
    pub competitor_urls: Vec<String>,
}

impl CompetitorComparisonRequest {
    fn all_urls(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.user_url).chain(&self.competitor_urls)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorComparisonInsight {
    pub results: Vec<CompetitorResult>,
    #[serde(default)]
    pub insights: ComparisonInsights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorResult {
    pub url: String,
    pub aeo_score: f64,
    pub visibility_score: f64,
    pub content_score: f64,
    pub citation_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonInsights {
    #[serde(default)]
    pub your_rank: Option<u32>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
}

impl InsightRequest for CompetitorComparisonRequest {
    type Payload = CompetitorComparisonInsight;

    fn prompt(&self) -> String {
        let urls = self
            .all_urls()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Compare these URLs for AI visibility: {urls}.\n\
             Return JSON with a results array of objects (url, aeoScore, visibilityScore, \
             contentScore, citationScore, each 0-100, plus strengths and weaknesses arrays) and \
             an insights object (yourRank, gaps, opportunities)."
        )
    }

    fn validate(&self, payload: &CompetitorComparisonInsight) -> Result<()> {
        ensure!(!payload.results.is_empty(), "comparison has no results");
        for result in &payload.results {
            ensure_score("aeoScore", result.aeo_score)?;
            ensure_score("visibilityScore", result.visibility_score)?;
            ensure_score("contentScore", result.content_score)?;
            ensure_score("citationScore", result.citation_score)?;
        }
        Ok(())
    }

    fn fallback(&self, rng: &mut dyn RngCore) -> CompetitorComparisonInsight {
        CompetitorComparisonInsight {
            results: self
                .all_urls()
                .map(|url| CompetitorResult {
                    url: url.clone(),
                    aeo_score: rng.gen_range(60.0..90.0),
                    visibility_score: rng.gen_range(55.0..90.0),
                    content_score: rng.gen_range(65.0..90.0),
                    citation_score: rng.gen_range(50.0..90.0),
                    strengths: strings(&[
                        "Good content structure",
                        "Strong metadata",
                        "Mobile optimized",
                    ]),
                    weaknesses: strings(&[
                        "Limited FAQ content",
                        "Missing schema markup",
                        "Low authority signals",
                    ]),
                })
                .collect(),
            insights: ComparisonInsights {
                your_rank: Some(1),
                gaps: strings(&["Add more FAQ content", "Improve schema markup"]),
                opportunities: strings(&[
                    "Target voice search queries",
                    "Build authority content",
                ]),
            },
        }
    }
}

pub struct VoiceScanRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceScanInsight {
    pub voice_score: f64,
    pub analysis: VoiceAnalysis,
    #[serde(default)]
    pub recommendations: Vec<VoiceRecommendation>,
    #[serde(default)]
    pub voice_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceAnalysis {
    pub question_answer_format: f64,
    pub natural_language: f64,
    pub featured_snippets: f64,
    pub schema_markup: f64,
    pub conversational_tone: f64,
    pub answer_length: f64,
    pub mobile_optimization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceRecommendation {
    pub category: String,
    pub suggestion: String,
    pub priority: String,
}

impl InsightRequest for VoiceScanRequest {
    type Payload = VoiceScanInsight;

    fn prompt(&self) -> String {
        format!(
            "Analyze this website URL for voice search readiness: {}\n\
             Provide a JSON response with: voiceScore (0-100); analysis with \
             questionAnswerFormat, naturalLanguage, featuredSnippets, schemaMarkup, \
             conversationalTone, answerLength and mobileOptimization (each 0-100); \
             recommendations array of {{category, suggestion, priority}}; and voiceKeywords array.",
            self.url
        )
    }

    fn validate(&self, payload: &VoiceScanInsight) -> Result<()> {
        ensure_score("voiceScore", payload.voice_score)
    }

    fn fallback(&self, _rng: &mut dyn RngCore) -> VoiceScanInsight {
        VoiceScanInsight {
            voice_score: 65.0,
            analysis: VoiceAnalysis {
                question_answer_format: 70.0,
                natural_language: 65.0,
                featured_snippets: 60.0,
                schema_markup: 50.0,
                conversational_tone: 75.0,
                answer_length: 55.0,
                mobile_optimization: 80.0,
            },
            recommendations: vec![
                VoiceRecommendation {
                    category: "FAQ Structure".into(),
                    suggestion: "Add FAQ sections with natural questions users ask".into(),
                    priority: "high".into(),
                },
                VoiceRecommendation {
                    category: "Answer Length".into(),
                    suggestion: "Optimize answers to 25-30 words for voice responses".into(),
                    priority: "high".into(),
                },
            ],
            voice_keywords: strings(&["how to [topic]", "what is [topic]", "best way to [action]"]),
        }
    }
}

pub struct SalesTrackingRequest {
    pub competitor_url: String,
    pub company_name: String,
}

impl InsightRequest for SalesTrackingRequest {
    type Payload = TrackingMetrics;

    fn prompt(&self) -> String {
        format!(
            "Estimate how visible {} ({}) is in AI shopping assistants and AI search answers.\n\
             Provide a JSON response with: aiMentions (integer), recommendationFrequency, \
             citationRate, shoppingPresence and brandTrustScore (each 0-1), estimatedTraffic \
             (integer monthly visits), and insights array.",
            self.company_name, self.competitor_url
        )
    }

    fn validate(&self, metrics: &TrackingMetrics) -> Result<()> {
        ensure!(metrics.ai_mentions >= 0, "negative aiMentions");
        ensure!(metrics.estimated_traffic >= 0, "negative estimatedTraffic");
        ensure_fraction("recommendationFrequency", metrics.recommendation_frequency)?;
        ensure_fraction("citationRate", metrics.citation_rate)?;
        ensure_fraction("shoppingPresence", metrics.shopping_presence)?;
        ensure_fraction("brandTrustScore", metrics.brand_trust_score)
    }

    fn fallback(&self, rng: &mut dyn RngCore) -> TrackingMetrics {
        TrackingMetrics {
            ai_mentions: rng.gen_range(100..600),
            recommendation_frequency: rng.gen_range(0.3..0.8),
            citation_rate: rng.gen_range(0.2..0.6),
            shopping_presence: rng.gen_range(0.2..0.8),
            brand_trust_score: rng.gen_range(0.6..0.9),
            estimated_traffic: rng.gen_range(1000..6000),
            insights: strings(&[
                "Strong presence in product category searches",
                "High citation rate indicates authority",
                "Growing momentum in AI shopping assistants",
            ]),
        }
    }
}
