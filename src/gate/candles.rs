//! Candle-pattern gate: six boolean breakout/trend patterns plus four
//! momentum/volume indicators, composed into a [0,1] score (§4.7).
//!
//! Grounded on `candle_analysis.py`'s V6.0 scoring
//! (`calculate_candle_score_v6`) and `signals.py::passes_candle_analysis`
//! for the fail-open/early-token override wiring.

use crate::config::Config;

const EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    WeakBullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStrategy {
    Aggressive,
    Cautious,
    Watch,
    Wait,
}

#[derive(Debug, Clone)]
pub struct CandleAnalysis {
    pub bullish_breakout: bool,
    pub volume_accumulation: bool,
    pub upward_trend: bool,
    pub rejection_patterns: bool,
    pub positive_momentum: bool,
    pub consolidation_breakout: bool,
    pub momentum_confirmation: f64,
    pub volume_price_divergence: Sentiment,
    pub buy_pressure_ratio: f64,
    pub trend_strength: f64,
    pub wick_sentiment: Sentiment,
    pub score: f64,
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn bullish_breakout(candles: &[Candle]) -> bool {
    let n = candles.len();
    if n < 5 {
        return false;
    }
    let consolidation_period = 4.min(n - 1);
    let window = &candles[n - consolidation_period - 1..n - 1];
    let consolidation_high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let consolidation_low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let range = consolidation_high - consolidation_low;
    if range <= 0.0 {
        return false;
    }

    let current_close = candles[n - 1].close;
    let current_volume = candles[n - 1].volume;
    if current_close > consolidation_high {
        let avg_volume = mean(&window.iter().map(|c| c.volume).collect::<Vec<_>>());
        let volume_confirmation = current_volume > avg_volume * 1.5;
        let breakout_strength = (current_close - consolidation_high) / consolidation_high;
        volume_confirmation && breakout_strength > 0.02
    } else {
        false
    }
}

fn volume_accumulation(candles: &[Candle]) -> bool {
    if candles.len() < 5 {
        return false;
    }
    let up_day_volumes: Vec<f64> = candles.iter().filter(|c| c.close > c.open).map(|c| c.volume).collect();
    if up_day_volumes.len() < 3 {
        return false;
    }
    up_day_volumes.windows(2).all(|w| w[0] < w[1])
}

fn upward_trend(candles: &[Candle]) -> bool {
    let n = candles.len();
    if n < 5 {
        return false;
    }
    let recent_highs = &candles[n - 5..];
    let higher_highs = recent_highs.windows(2).all(|w| w[0].high < w[1].high);
    let higher_lows = recent_highs.windows(2).all(|w| w[0].low < w[1].low);
    higher_highs && higher_lows
}

fn rejection_patterns(candles: &[Candle]) -> bool {
    let n = candles.len();
    if n < 3 {
        return false;
    }
    candles[n - 3..].iter().any(|c| {
        let body_size = (c.close - c.open).abs();
        let wick_size = c.low - c.open.min(c.close);
        wick_size > body_size * 2.0 && c.close > c.open
    })
}

fn positive_momentum(candles: &[Candle]) -> bool {
    let n = candles.len();
    if n < 3 {
        return false;
    }
    let recent = &candles[n - 3..];
    let green_count = recent.iter().filter(|c| c.close > c.open).count();
    let first_open = recent[0].open;
    let current_close = candles[n - 1].close;
    green_count >= 2 && current_close > first_open
}

fn consolidation_breakout(candles: &[Candle]) -> bool {
    let n = candles.len();
    if n < 6 {
        return false;
    }
    let consolidation_period = 5.min(n - 1);
    let window = &candles[n - consolidation_period - 1..n - 1];
    let consolidation_high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let consolidation_low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let range = consolidation_high - consolidation_low;
    if range <= 0.0 {
        return false;
    }

    let current_close = candles[n - 1].close;
    let current_volume = candles[n - 1].volume;
    let avg_volume = mean(&window.iter().map(|c| c.volume).collect::<Vec<_>>());

    if current_close > consolidation_high {
        current_volume > avg_volume * 2.0
    } else if current_close < consolidation_low {
        current_volume > avg_volume * 1.5
    } else {
        false
    }
}

fn momentum_confirmation(candles: &[Candle]) -> f64 {
    let n = candles.len();
    if n < 3 {
        return 0.5;
    }
    let recent = &candles[n - 3..];
    let mut score = 0.0;

    if recent[2].close > recent[0].close {
        let price_change = (recent[2].close - recent[0].close) / (recent[0].close + EPS);
        score += (price_change * 10.0).min(0.3);
    }
    if recent[2].volume > recent[0].volume {
        let vol_change = (recent[2].volume - recent[0].volume) / (recent[0].volume + EPS);
        score += (vol_change * 0.5).min(0.3);
    }
    let green_count = recent.iter().filter(|c| c.close > c.open).count();
    score += (green_count as f64 / 3.0) * 0.4;

    score.min(1.0)
}

fn volume_price_divergence(candles: &[Candle]) -> Sentiment {
    let n = candles.len();
    if n < 4 {
        return Sentiment::Neutral;
    }
    let price_start = mean(&candles[n - 4..n - 2].iter().map(|c| c.close).collect::<Vec<_>>());
    let price_end = mean(&candles[n - 2..].iter().map(|c| c.close).collect::<Vec<_>>());
    let vol_start = mean(&candles[n - 4..n - 2].iter().map(|c| c.volume).collect::<Vec<_>>());
    let vol_end = mean(&candles[n - 2..].iter().map(|c| c.volume).collect::<Vec<_>>());

    let price_up = price_end > price_start * 1.01;
    let price_down = price_end < price_start * 0.99;
    let vol_up = vol_end > vol_start * 1.1;
    let vol_down = vol_end < vol_start * 0.9;

    if price_up && vol_up {
        Sentiment::Bullish
    } else if price_up && vol_down {
        Sentiment::WeakBullish
    } else if price_down && vol_up {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

fn buy_pressure(candles: &[Candle]) -> f64 {
    if candles.len() < 2 {
        return 0.5;
    }
    let mut total_buy = 0.0;
    let mut total = 0.0;
    for c in candles {
        let buy_vol = if c.close >= c.open {
            let body_ratio = (c.close - c.open) / (c.high.max(c.close) - c.low.min(c.open) + EPS);
            c.volume * (0.5 + body_ratio * 0.4)
        } else {
            let body_ratio = (c.open - c.close) / (c.high.max(c.open) - c.low.min(c.close) + EPS);
            c.volume * (0.5 - body_ratio * 0.4)
        };
        total_buy += buy_vol;
        total += c.volume;
    }
    if total == 0.0 {
        0.5
    } else {
        total_buy / total
    }
}

fn trend_strength(candles: &[Candle]) -> f64 {
    let n = candles.len();
    if n < 3 {
        return 0.5;
    }
    let mut true_ranges = Vec::with_capacity(n - 1);
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);

    for i in 1..n {
        let (high, low, prev_close, prev_high, prev_low) =
            (candles[i].high, candles[i].low, candles[i - 1].close, candles[i - 1].high, candles[i - 1].low);

        let tr = (high - low).max((high - prev_close).abs()).max((low - prev_close).abs());
        true_ranges.push(tr);

        let up_move = high - prev_high;
        let down_move = prev_low - low;
        if up_move > down_move && up_move > 0.0 {
            plus_dm.push(up_move);
            minus_dm.push(0.0);
        } else if down_move > up_move && down_move > 0.0 {
            plus_dm.push(0.0);
            minus_dm.push(down_move);
        } else {
            plus_dm.push(0.0);
            minus_dm.push(0.0);
        }
    }

    if true_ranges.iter().sum::<f64>() == 0.0 {
        return 0.5;
    }
    let avg_tr = mean(&true_ranges);
    if avg_tr == 0.0 {
        return 0.5;
    }
    let plus_di = mean(&plus_dm) / avg_tr;
    let minus_di = mean(&minus_dm) / avg_tr;
    let dx = (plus_di - minus_di).abs() / (plus_di + minus_di + EPS);
    dx.clamp(0.0, 1.0)
}

fn wick_sentiment(candles: &[Candle]) -> Sentiment {
    let n = candles.len();
    if n < 3 {
        return Sentiment::Neutral;
    }
    let recent = &candles[n - 3..];
    let mut bullish_rejections = 0;
    let mut bearish_rejections = 0;
    for c in recent {
        let body = (c.close - c.open).abs();
        if body <= 0.0 {
            continue;
        }
        let upper_ratio = (c.high - c.open.max(c.close)) / body;
        let lower_ratio = (c.open.min(c.close) - c.low) / body;
        if lower_ratio > 2.0 && c.close > c.open {
            bullish_rejections += 1;
        }
        if upper_ratio > 2.0 && c.close < c.open {
            bearish_rejections += 1;
        }
    }
    if bullish_rejections > bearish_rejections {
        Sentiment::Bullish
    } else if bearish_rejections > bullish_rejections {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

/// Composite V6.0 score: traditional pattern weights, adjusted by
/// momentum/divergence/buy-pressure/trend-strength/wick modifiers,
/// clamped to `[0, 1]`.
pub fn analyze_candles(candles: &[Candle]) -> CandleAnalysis {
    let bullish_breakout = bullish_breakout(candles);
    let volume_accumulation = volume_accumulation(candles);
    let upward_trend = upward_trend(candles);
    let rejection_patterns = rejection_patterns(candles);
    let positive_momentum = positive_momentum(candles);
    let consolidation_breakout = consolidation_breakout(candles);
    let momentum_confirmation = momentum_confirmation(candles);
    let volume_price_divergence = volume_price_divergence(candles);
    let buy_pressure_ratio = buy_pressure(candles);
    let trend_strength = trend_strength(candles);
    let wick_sentiment = wick_sentiment(candles);

    let mut score = 0.0;
    if bullish_breakout {
        score += 0.20;
    }
    if volume_accumulation {
        score += 0.15;
    }
    if upward_trend {
        score += 0.15;
    }
    if rejection_patterns {
        score += 0.10;
    }
    if positive_momentum {
        score += 0.10;
    }
    if consolidation_breakout {
        score += 0.10;
    }

    score += (momentum_confirmation - 0.5) * 0.4;

    match volume_price_divergence {
        Sentiment::Bullish => score += 0.15,
        Sentiment::WeakBullish => score += 0.05,
        Sentiment::Bearish => score -= 0.20,
        Sentiment::Neutral => {}
    }

    if buy_pressure_ratio > 0.65 {
        score += 0.10;
    } else if buy_pressure_ratio < 0.35 {
        score -= 0.10;
    }

    if trend_strength > 0.6 && buy_pressure_ratio > 0.5 {
        score += 0.10;
    } else if trend_strength < 0.3 {
        score -= 0.05;
    }

    match wick_sentiment {
        Sentiment::Bullish => score += 0.05,
        Sentiment::Bearish => score -= 0.05,
        _ => {}
    }

    CandleAnalysis {
        bullish_breakout,
        volume_accumulation,
        upward_trend,
        rejection_patterns,
        positive_momentum,
        consolidation_breakout,
        momentum_confirmation,
        volume_price_divergence,
        buy_pressure_ratio,
        trend_strength,
        wick_sentiment,
        score: score.clamp(0.0, 1.0),
    }
}

fn is_early_token(candles: &[Candle], age_minutes: f64) -> bool {
    candles.len() < 6 || age_minutes < 15.0
}

fn early_token_strategy(candles: &[Candle], analysis: &CandleAnalysis) -> EarlyStrategy {
    if candles.len() < 3 {
        return EarlyStrategy::Wait;
    }
    if analysis.bullish_breakout || analysis.consolidation_breakout {
        EarlyStrategy::Aggressive
    } else if analysis.volume_accumulation && analysis.positive_momentum {
        EarlyStrategy::Cautious
    } else if analysis.rejection_patterns {
        EarlyStrategy::Watch
    } else {
        EarlyStrategy::Wait
    }
}

/// Fewer than 3 candles is treated as evaluation failure — fail-open for
/// very new tokens (<10 min), reject otherwise since there is nothing to
/// analyze. With ≥3 candles, the gate passes on the composite score or on
/// an early-token aggressive/cautious override.
pub fn passes_candle_gate(candles: &[Candle], age_minutes: f64, cfg: &Config) -> bool {
    if candles.len() < 3 {
        return age_minutes < 10.0;
    }

    let analysis = analyze_candles(candles);
    if analysis.score >= cfg.candle_pass_score {
        return true;
    }

    if is_early_token(candles, age_minutes) {
        let strategy = early_token_strategy(candles, &analysis);
        if matches!(strategy, EarlyStrategy::Aggressive | EarlyStrategy::Cautious) {
            return true;
        }
    }

    cfg.candle_gate_fail_open && candles.is_empty()
}
