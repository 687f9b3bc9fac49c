//! Fixed prompt text sent to evaluated models and to the judge.

use crate::request::{Category, Dialect};

/// Instruction context prepended to every evaluated model call, whatever the provider.
pub const SYSTEM_PROMPT: &str = "أنت مساعد ذكاء اصطناعي متخصص في اللغة العربية بجميع لهجاتها ومصطلحاتها التقنية. \
قدّم إجابات دقيقة ومفيدة، مع مراعاة السياق اللغوي والثقافي العربي. \
التزم باللهجة المطلوبة في إجاباتك.\n\n\
You are an AI assistant specialized in Arabic in all its dialects and technical \
terminology. Provide accurate, helpful, culturally-aware answers. \
Respond in the requested dialect.";

pub const JUDGE_RUBRIC: &str = r#"أنت محكّم خبير في تقييم مخرجات نماذج اللغة العربية.

You are an expert judge evaluating Arabic language model outputs.
Score each response on these 6 dimensions (0.0–10.0 each):

1. arabic_quality      — Grammar, fluency, naturalness of Arabic
2. accuracy            — Factual correctness and relevance to the prompt
3. dialect_adherence   — How well it matches the requested Arabic dialect
4. technical_precision — Correct use of technical or domain-specific terminology
5. completeness        — How thoroughly and completely it addresses the prompt
6. cultural_sensitivity — Cultural appropriateness for an Arab audience

Scoring scale:
  9.5–10.0 → Exceptional / Native-level
  8.0–9.4  → Strong / Professional quality
  6.0–7.9  → Acceptable / Minor issues
  4.0–5.9  → Weak / Significant problems
  0.0–3.9  → Poor / Fails the dimension

CRITICAL: Respond ONLY with valid JSON — no markdown fences, no preamble:
{
  "arabic_quality": <float>,
  "accuracy": <float>,
  "dialect_adherence": <float>,
  "technical_precision": <float>,
  "completeness": <float>,
  "cultural_sensitivity": <float>,
  "overall": <weighted_average_float>,
  "reasoning": "<one sentence Arabic or English explanation>"
}"#;

/// The user turn of a judge call.
#[derive(Debug, Clone, Copy)]
pub struct JudgePrompt<'a> {
    pub prompt: &'a str,
    pub response: &'a str,
    pub dialect: Dialect,
    pub category: Category,
    pub reference_answer: Option<&'a str>,
}

impl<'a> JudgePrompt<'a> {
    pub fn build(&self) -> String {
        let reference = match self.reference_answer {
            Some(answer) if !answer.is_empty() => format!("\nReference Answer:\n{}", answer),
            _ => String::new(),
        };
        format!(
            "Dialect requested: {}\nCategory: {}\n\nPrompt:\n{}\n\nModel Response:\n{}{}\n\n\
             Score this response. Return only the JSON object.",
            self.dialect, self.category, self.prompt, self.response, reference
        )
    }
}
