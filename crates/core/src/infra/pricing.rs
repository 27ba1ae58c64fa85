use serde::Serialize;

/// 100万トークンあたりの価格（USD）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
    pub model: &'static str,
    pub input_per_million: f64,
    pub output_per_million: f64,
    /// コンテキスト長の表示値
    pub context: &'static str,
}

const fn price(
    model: &'static str,
    input_per_million: f64,
    output_per_million: f64,
    context: &'static str,
) -> ModelPricing {
    ModelPricing {
        model,
        input_per_million,
        output_per_million,
        context,
    }
}

pub static MODEL_PRICING: [ModelPricing; 9] = [
    price("grok-3", 3.00, 15.00, "131k"),
    price("grok-3-latest", 3.00, 15.00, "131k"),
    price("grok-3-fast", 5.00, 25.00, "131k"),
    price("grok-3-fast-latest", 5.00, 25.00, "131k"),
    price("grok-3-mini", 0.30, 0.50, "131k"),
    price("grok-3-mini-latest", 0.30, 0.50, "131k"),
    price("grok-3-mini-fast", 0.60, 4.00, "131k"),
    price("grok-3-mini-fast-latest", 0.60, 4.00, "131k"),
    // キャッシュミス時の標準価格
    price("deepseek-chat", 0.27, 1.10, "64k"),
];

pub fn pricing_for(model: &str) -> Option<&'static ModelPricing> {
    MODEL_PRICING.iter().find(|p| p.model == model.trim())
}

/// 費用見積もり
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// 価格表にないモデルは None
pub fn estimate_cost(model: &str, input_tokens: usize, output_tokens: usize) -> Option<CostEstimate> {
    let pricing = pricing_for(model)?;
    let input_cost = input_tokens as f64 / 1_000_000.0 * pricing.input_per_million;
    let output_cost = output_tokens as f64 / 1_000_000.0 * pricing.output_per_million;
    Some(CostEstimate {
        input_tokens,
        output_tokens,
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
    })
}
