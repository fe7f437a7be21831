use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{
    BettingQuote, CashQuote, ChargeType, CryptoQuote, PayoutQuote, TradeSide, VtuQuote,
};

/// Errors produced while resolving rates or validating rate tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("rate must be between 0 and 1, got {0}")]
    RateOutOfRange(Decimal),
    #[error("margin cannot be below -100 percent, got {0}")]
    MarginOutOfRange(Decimal),
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("no rate tier covers {0}")]
    NoTierMatch(Decimal),
    #[error("tier table invalid around {0}: ranges must be ordered and disjoint")]
    InvalidTier(Decimal),
    #[error("exchange rate must be positive, got {0}")]
    InvalidExchangeRate(Decimal),
}

// Wallet balances are naira with two decimal places (kobo)
fn round_naira(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

fn ensure_positive(amount: Decimal) -> Result<(), RateError> {
    if amount <= Decimal::ZERO {
        return Err(RateError::NonPositiveAmount(amount));
    }
    Ok(())
}

fn ensure_margin(margin_percent: Decimal) -> Result<(), RateError> {
    if margin_percent < -Decimal::ONE_HUNDRED {
        return Err(RateError::MarginOutOfRange(margin_percent));
    }
    Ok(())
}

/// Percentage margin applied on top of the amount forwarded upstream.
///
/// Used for airtime and electricity, where the purchase amount is free-form
/// and the wallet is charged `amount * (1 + margin/100)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtuRate {
    pub margin_percent: Decimal,
}

impl VtuRate {
    pub fn new(margin_percent: Decimal) -> Result<Self, RateError> {
        ensure_margin(margin_percent)?;
        Ok(Self { margin_percent })
    }

    pub fn validate(&self) -> Result<(), RateError> {
        ensure_margin(self.margin_percent)
    }

    /// Prices a purchase of `amount`: the wallet pays `price`, the
    /// aggregator receives `amount`. With a non-negative margin the price
    /// never undercuts the forwarded amount.
    pub fn quote(&self, amount: Decimal) -> Result<VtuQuote, RateError> {
        ensure_positive(amount)?;
        self.validate()?;
        let factor = Decimal::ONE + self.margin_percent / Decimal::ONE_HUNDRED;
        let price = round_naira(amount * factor);
        Ok(VtuQuote {
            price,
            upstream_amount: amount,
            margin: price - amount,
        })
    }
}

/// A fixed-price plan (data bundle, cable package, exam card) with the
/// aggregator's cost and the platform margin baked into the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRate {
    /// Upstream variation / package code sent to the aggregator.
    pub code: String,
    pub name: String,
    /// What the aggregator charges the platform float.
    pub provider_cost: Decimal,
    pub margin_percent: Decimal,
}

impl PlanRate {
    pub fn validate(&self) -> Result<(), RateError> {
        ensure_positive(self.provider_cost)?;
        ensure_margin(self.margin_percent)
    }

    /// Price presented to the user and deducted from the wallet.
    pub fn final_price(&self) -> Decimal {
        let factor = Decimal::ONE + self.margin_percent / Decimal::ONE_HUNDRED;
        round_naira(self.provider_cost * factor)
    }

    /// Quote for buying `quantity` of this plan.
    pub fn quote(&self, quantity: u32) -> Result<VtuQuote, RateError> {
        if quantity == 0 {
            return Err(RateError::ZeroQuantity);
        }
        self.validate()?;
        let qty = Decimal::from(quantity);
        let price = round_naira(self.final_price() * qty);
        let upstream_amount = round_naira(self.provider_cost * qty);
        Ok(VtuQuote {
            price,
            upstream_amount,
            margin: price - upstream_amount,
        })
    }
}

/// Lookup table of plans keyed by upstream code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTable {
    plans: Vec<PlanRate>,
}

impl PlanTable {
    pub fn new(plans: Vec<PlanRate>) -> Self {
        Self { plans }
    }

    pub fn plans(&self) -> &[PlanRate] {
        &self.plans
    }

    pub fn lookup(&self, code: &str) -> Result<&PlanRate, RateError> {
        self.plans
            .iter()
            .find(|p| p.code == code)
            .ok_or_else(|| RateError::UnknownPlan(code.to_string()))
    }

    pub fn validate(&self) -> Result<(), RateError> {
        for plan in &self.plans {
            plan.validate()?;
        }
        Ok(())
    }
}

/// Airtime-to-cash conversion rates, one rate in [0, 1] per network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirtimeCashRates {
    rates: HashMap<String, Decimal>,
}

impl AirtimeCashRates {
    pub fn set_rate(&mut self, network: &str, rate: Decimal) -> Result<(), RateError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(RateError::RateOutOfRange(rate));
        }
        self.rates.insert(network.to_string(), rate);
        Ok(())
    }

    pub fn rate(&self, network: &str) -> Result<Decimal, RateError> {
        self.rates
            .get(network)
            .copied()
            .ok_or_else(|| RateError::UnknownNetwork(network.to_string()))
    }

    pub fn networks(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.rates.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Splits an airtime amount into the wallet credit and the platform fee.
    ///
    /// `amount_received = amount * rate`; the fee is the remainder, so the
    /// two always sum back to the submitted amount even after rounding.
    pub fn quote(&self, network: &str, amount: Decimal) -> Result<CashQuote, RateError> {
        ensure_positive(amount)?;
        let rate = self.rate(network)?;
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(RateError::RateOutOfRange(rate));
        }
        let amount_received = round_naira(amount * rate);
        Ok(CashQuote {
            amount_received,
            service_fee: amount - amount_received,
        })
    }

    pub fn validate(&self) -> Result<(), RateError> {
        for (_, rate) in self.rates.iter() {
            if *rate < Decimal::ZERO || *rate > Decimal::ONE {
                return Err(RateError::RateOutOfRange(*rate));
            }
        }
        Ok(())
    }
}

/// Service charge added on top of betting wallet funding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BettingCharge {
    pub charge_type: ChargeType,
    pub value: Decimal,
}

impl BettingCharge {
    pub fn validate(&self) -> Result<(), RateError> {
        if self.value < Decimal::ZERO {
            return Err(RateError::NonPositiveAmount(self.value));
        }
        Ok(())
    }

    /// `total = amount + charge`, where the charge is the configured fixed
    /// value or `amount * value / 100` for percentage charges.
    pub fn quote(&self, amount: Decimal) -> Result<BettingQuote, RateError> {
        ensure_positive(amount)?;
        self.validate()?;
        let service_charge = match self.charge_type {
            ChargeType::Fixed => self.value,
            ChargeType::Percent => round_naira(amount * self.value / Decimal::ONE_HUNDRED),
        };
        Ok(BettingQuote {
            total: amount + service_charge,
            service_charge,
        })
    }
}

/// Crypto trade pricing: margin over the live USD price, converted to NGN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoPricing {
    pub buy_margin_percent: Decimal,
    pub sell_margin_percent: Decimal,
    /// NGN per USD.
    pub usd_to_ngn: Decimal,
}

impl CryptoPricing {
    pub fn validate(&self) -> Result<(), RateError> {
        ensure_margin(self.buy_margin_percent)?;
        ensure_margin(self.sell_margin_percent)?;
        if self.usd_to_ngn <= Decimal::ZERO {
            return Err(RateError::InvalidExchangeRate(self.usd_to_ngn));
        }
        Ok(())
    }

    /// Final NGN price for one asset unit:
    /// buy `live * (1 + margin/100) * fx`, sell `live * (1 - margin/100) * fx`.
    pub fn unit_price(&self, side: TradeSide, live_usd: Decimal) -> Result<Decimal, RateError> {
        ensure_positive(live_usd)?;
        self.validate()?;
        let factor = match side {
            TradeSide::Buy => Decimal::ONE + self.buy_margin_percent / Decimal::ONE_HUNDRED,
            TradeSide::Sell => Decimal::ONE - self.sell_margin_percent / Decimal::ONE_HUNDRED,
        };
        Ok(round_naira(live_usd * factor * self.usd_to_ngn))
    }

    pub fn quote(
        &self,
        side: TradeSide,
        live_usd: Decimal,
        units: Decimal,
    ) -> Result<CryptoQuote, RateError> {
        ensure_positive(units)?;
        let unit_price = self.unit_price(side, live_usd)?;
        Ok(CryptoQuote {
            unit_price,
            total: round_naira(units * unit_price),
        })
    }
}

/// One `[min, max]` face-value range and its payout rate (NGN per unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTier {
    pub min: Decimal,
    pub max: Decimal,
    pub rate: Decimal,
}

/// Tier table for one gift-card brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCardRate {
    pub brand: String,
    /// Face-value currency, e.g. "USD".
    pub currency: String,
    pub tiers: Vec<RateTier>,
}

impl GiftCardRate {
    /// Tiers must be ordered, non-overlapping `[min, max]` ranges with
    /// positive rates so every face value maps to at most one tier.
    pub fn validate(&self) -> Result<(), RateError> {
        let mut prev_max: Option<Decimal> = None;
        for tier in &self.tiers {
            if tier.min > tier.max || tier.rate <= Decimal::ZERO {
                return Err(RateError::InvalidTier(tier.min));
            }
            if let Some(prev) = prev_max {
                if tier.min <= prev {
                    return Err(RateError::InvalidTier(tier.min));
                }
            }
            prev_max = Some(tier.max);
        }
        Ok(())
    }

    /// The unique tier whose range contains `face_value`.
    pub fn tier_for(&self, face_value: Decimal) -> Result<&RateTier, RateError> {
        self.tiers
            .iter()
            .find(|t| face_value >= t.min && face_value <= t.max)
            .ok_or(RateError::NoTierMatch(face_value))
    }

    /// Payout for a card of the given face value.
    pub fn payout(&self, face_value: Decimal) -> Result<PayoutQuote, RateError> {
        ensure_positive(face_value)?;
        let tier = self.tier_for(face_value)?;
        Ok(PayoutQuote {
            payout: round_naira(face_value * tier.rate),
            rate: tier.rate,
        })
    }
}

/// Every rate table the platform consults, editable as one document.
///
/// This is the analog of the per-service settings documents the admin UI
/// edits and every purchase form reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSettings {
    /// Per-network airtime purchase margin.
    pub airtime: HashMap<String, VtuRate>,
    pub airtime_cash: AirtimeCashRates,
    /// Data bundles per network.
    pub data: HashMap<String, PlanTable>,
    /// Cable packages per provider.
    pub cable: HashMap<String, PlanTable>,
    pub electricity: VtuRate,
    pub exam_cards: PlanTable,
    pub smm: VtuRate,
    pub betting: BettingCharge,
    pub crypto: CryptoPricing,
    pub gift_cards: Vec<GiftCardRate>,
}

impl RateSettings {
    /// Starter tables so a fresh server prices every service out of the box.
    pub fn seed() -> Self {
        let pct = |n: i64, scale: u32| Decimal::new(n, scale);
        let mut airtime = HashMap::new();
        for network in ["mtn", "glo", "airtel", "9mobile"] {
            airtime.insert(network.to_string(), VtuRate { margin_percent: Decimal::ZERO });
        }

        let mut airtime_cash = AirtimeCashRates::default();
        // set_rate only fails outside [0, 1]; these are fixed literals
        let _ = airtime_cash.set_rate("mtn", pct(75, 2));
        let _ = airtime_cash.set_rate("glo", pct(65, 2));
        let _ = airtime_cash.set_rate("airtel", pct(70, 2));
        let _ = airtime_cash.set_rate("9mobile", pct(60, 2));

        let plan = |code: &str, name: &str, cost: i64, margin: Decimal| PlanRate {
            code: code.to_string(),
            name: name.to_string(),
            provider_cost: Decimal::from(cost),
            margin_percent: margin,
        };
        let tier = |min: i64, max: i64, rate: i64| RateTier {
            min: Decimal::from(min),
            max: Decimal::from(max),
            rate: Decimal::from(rate),
        };

        let mut data = HashMap::new();
        data.insert(
            "mtn".to_string(),
            PlanTable::new(vec![
                plan("mtn-500mb-30", "500MB - 30 days", 145, Decimal::from(8)),
                plan("mtn-1gb-30", "1GB - 30 days", 259, Decimal::from(8)),
                plan("mtn-2gb-30", "2GB - 30 days", 518, Decimal::from(8)),
            ]),
        );
        data.insert(
            "glo".to_string(),
            PlanTable::new(vec![
                plan("glo-1gb-30", "1GB - 30 days", 250, Decimal::from(10)),
                plan("glo-2gb-30", "2GB - 30 days", 480, Decimal::from(10)),
            ]),
        );
        data.insert(
            "airtel".to_string(),
            PlanTable::new(vec![
                plan("airtel-750mb-14", "750MB - 14 days", 235, Decimal::from(9)),
                plan("airtel-1-5gb-30", "1.5GB - 30 days", 465, Decimal::from(9)),
            ]),
        );
        data.insert(
            "9mobile".to_string(),
            PlanTable::new(vec![plan("9mobile-1gb-30", "1GB - 30 days", 275, Decimal::from(10))]),
        );

        let mut cable = HashMap::new();
        cable.insert(
            "dstv".to_string(),
            PlanTable::new(vec![
                plan("dstv-padi", "DStv Padi", 3600, pct(15, 1)),
                plan("dstv-yanga", "DStv Yanga", 5100, pct(15, 1)),
                plan("dstv-compact", "DStv Compact", 19000, pct(15, 1)),
            ]),
        );
        cable.insert(
            "gotv".to_string(),
            PlanTable::new(vec![
                plan("gotv-jinja", "GOtv Jinja", 3900, pct(15, 1)),
                plan("gotv-jolli", "GOtv Jolli", 5800, pct(15, 1)),
            ]),
        );
        cable.insert(
            "startimes".to_string(),
            PlanTable::new(vec![
                plan("startimes-nova", "StarTimes Nova", 1900, Decimal::from(2)),
                plan("startimes-basic", "StarTimes Basic", 3700, Decimal::from(2)),
            ]),
        );

        RateSettings {
            airtime,
            airtime_cash,
            data,
            cable,
            electricity: VtuRate { margin_percent: pct(15, 1) },
            exam_cards: PlanTable::new(vec![
                plan("waec", "WAEC result checker PIN", 3400, Decimal::from(10)),
                plan("neco", "NECO token", 1200, Decimal::from(12)),
                plan("jamb", "JAMB ePIN", 6200, Decimal::from(5)),
            ]),
            smm: VtuRate { margin_percent: Decimal::from(20) },
            betting: BettingCharge {
                charge_type: ChargeType::Fixed,
                value: Decimal::from(100),
            },
            crypto: CryptoPricing {
                buy_margin_percent: pct(25, 1),
                sell_margin_percent: pct(25, 1),
                usd_to_ngn: Decimal::from(1550),
            },
            gift_cards: vec![
                GiftCardRate {
                    brand: "amazon".to_string(),
                    currency: "USD".to_string(),
                    tiers: vec![tier(25, 99, 1050), tier(100, 200, 1120), tier(201, 500, 1180)],
                },
                GiftCardRate {
                    brand: "itunes".to_string(),
                    currency: "USD".to_string(),
                    tiers: vec![tier(25, 100, 980), tier(101, 300, 1040)],
                },
                GiftCardRate {
                    brand: "steam".to_string(),
                    currency: "USD".to_string(),
                    tiers: vec![tier(20, 100, 1100), tier(101, 500, 1150)],
                },
            ],
        }
    }

    pub fn airtime_quote(&self, network: &str, amount: Decimal) -> Result<VtuQuote, RateError> {
        let rate = self
            .airtime
            .get(network)
            .ok_or_else(|| RateError::UnknownNetwork(network.to_string()))?;
        rate.quote(amount)
    }

    pub fn data_quote(
        &self,
        network: &str,
        plan_code: &str,
    ) -> Result<(PlanRate, VtuQuote), RateError> {
        let table = self
            .data
            .get(network)
            .ok_or_else(|| RateError::UnknownNetwork(network.to_string()))?;
        let plan = table.lookup(plan_code)?;
        Ok((plan.clone(), plan.quote(1)?))
    }

    pub fn cable_quote(
        &self,
        provider: &str,
        package_code: &str,
    ) -> Result<(PlanRate, VtuQuote), RateError> {
        let table = self
            .cable
            .get(provider)
            .ok_or_else(|| RateError::UnknownNetwork(provider.to_string()))?;
        let plan = table.lookup(package_code)?;
        Ok((plan.clone(), plan.quote(1)?))
    }

    pub fn electricity_quote(&self, amount: Decimal) -> Result<VtuQuote, RateError> {
        self.electricity.quote(amount)
    }

    pub fn exam_quote(
        &self,
        exam_code: &str,
        quantity: u32,
    ) -> Result<(PlanRate, VtuQuote), RateError> {
        let plan = self.exam_cards.lookup(exam_code)?;
        Ok((plan.clone(), plan.quote(quantity)?))
    }

    pub fn smm_quote(&self, panel_cost: Decimal) -> Result<VtuQuote, RateError> {
        self.smm.quote(panel_cost)
    }

    pub fn betting_quote(&self, amount: Decimal) -> Result<BettingQuote, RateError> {
        self.betting.quote(amount)
    }

    pub fn cash_quote(&self, network: &str, amount: Decimal) -> Result<CashQuote, RateError> {
        self.airtime_cash.quote(network, amount)
    }

    pub fn gift_card(&self, brand: &str) -> Result<&GiftCardRate, RateError> {
        self.gift_cards
            .iter()
            .find(|g| g.brand == brand)
            .ok_or_else(|| RateError::UnknownPlan(brand.to_string()))
    }

    /// Full-table validation, run before accepting an admin update.
    pub fn validate(&self) -> Result<(), RateError> {
        for rate in self.airtime.values() {
            rate.validate()?;
        }
        self.airtime_cash.validate()?;
        for table in self.data.values() {
            table.validate()?;
        }
        for table in self.cable.values() {
            table.validate()?;
        }
        self.electricity.validate()?;
        self.exam_cards.validate()?;
        self.smm.validate()?;
        self.betting.validate()?;
        self.crypto.validate()?;
        for card in &self.gift_cards {
            card.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn setup_settings() -> RateSettings {
        RateSettings::seed()
    }

    #[test]
    fn test_seed_settings_are_valid() {
        assert!(setup_settings().validate().is_ok());
    }

    // Airtime-to-cash: amount_received = amount * rate,
    // service_fee = amount * (1 - rate)

    #[test]
    fn test_cash_quote_worked_example() {
        // NGN 1000 on mtn at rate 0.7 -> NGN 700 received, NGN 300 fee
        let mut rates = AirtimeCashRates::default();
        rates.set_rate("mtn", dec!(0.7)).unwrap();

        let quote = rates.quote("mtn", dec!(1000)).unwrap();
        assert_eq!(quote.amount_received, dec!(700));
        assert_eq!(quote.service_fee, dec!(300));
    }

    #[test]
    fn test_cash_quote_formula_across_rates() {
        let amount = dec!(1000);
        for rate in [dec!(0), dec!(0.25), dec!(0.5), dec!(0.6), dec!(0.85), dec!(1)] {
            let mut rates = AirtimeCashRates::default();
            rates.set_rate("glo", rate).unwrap();
            let quote = rates.quote("glo", amount).unwrap();
            assert_eq!(quote.amount_received, amount * rate);
            assert_eq!(quote.service_fee, amount * (Decimal::ONE - rate));
        }
    }

    #[test]
    fn test_cash_quote_split_sums_to_amount() {
        let settings = setup_settings();
        for amount in [dec!(50), dec!(333.33), dec!(1000), dec!(24999.99)] {
            let quote = settings.cash_quote("airtel", amount).unwrap();
            assert_eq!(quote.amount_received + quote.service_fee, amount);
        }
    }

    #[test]
    fn test_cash_rate_out_of_range_rejected() {
        let mut rates = AirtimeCashRates::default();
        assert_eq!(
            rates.set_rate("mtn", dec!(1.01)),
            Err(RateError::RateOutOfRange(dec!(1.01)))
        );
        assert_eq!(
            rates.set_rate("mtn", dec!(-0.1)),
            Err(RateError::RateOutOfRange(dec!(-0.1)))
        );
    }

    #[test]
    fn test_cash_quote_unknown_network() {
        let settings = setup_settings();
        assert_eq!(
            settings.cash_quote("visafone", dec!(500)),
            Err(RateError::UnknownNetwork("visafone".to_string()))
        );
    }

    // VTU purchases: price must never be below the forwarded amount when a
    // positive margin is configured

    #[test]
    fn test_vtu_quote_price_covers_upstream_amount() {
        for margin in [dec!(0), dec!(0.5), dec!(1.5), dec!(10)] {
            let rate = VtuRate { margin_percent: margin };
            for amount in [dec!(50), dec!(1000), dec!(18500.50)] {
                let quote = rate.quote(amount).unwrap();
                assert!(
                    quote.price >= quote.upstream_amount,
                    "price {} below upstream {} at margin {}",
                    quote.price,
                    quote.upstream_amount,
                    margin
                );
                assert_eq!(quote.margin, quote.price - quote.upstream_amount);
            }
        }
    }

    #[test]
    fn test_vtu_quote_applies_margin() {
        let rate = VtuRate { margin_percent: dec!(2) };
        let quote = rate.quote(dec!(1000)).unwrap();
        assert_eq!(quote.price, dec!(1020.00));
        assert_eq!(quote.upstream_amount, dec!(1000));
        assert_eq!(quote.margin, dec!(20.00));
    }

    #[test]
    fn test_vtu_quote_rejects_non_positive_amount() {
        let rate = VtuRate { margin_percent: dec!(1) };
        assert_eq!(
            rate.quote(dec!(0)),
            Err(RateError::NonPositiveAmount(dec!(0)))
        );
        assert_eq!(
            rate.quote(dec!(-20)),
            Err(RateError::NonPositiveAmount(dec!(-20)))
        );
    }

    #[test]
    fn test_vtu_margin_below_negative_hundred_rejected() {
        assert_eq!(
            VtuRate::new(dec!(-100.5)).unwrap_err(),
            RateError::MarginOutOfRange(dec!(-100.5))
        );
        // a discount margin is allowed, the invariant only binds positive margins
        let discounted = VtuRate::new(dec!(-2)).unwrap();
        let quote = discounted.quote(dec!(1000)).unwrap();
        assert_eq!(quote.price, dec!(980.00));
    }

    // Plan tables

    #[test]
    fn test_plan_final_price() {
        let plan = PlanRate {
            code: "mtn-1gb-30".to_string(),
            name: "1GB - 30 days".to_string(),
            provider_cost: dec!(259),
            margin_percent: dec!(8),
        };
        assert_eq!(plan.final_price(), dec!(279.72));
        let quote = plan.quote(1).unwrap();
        assert_eq!(quote.price, dec!(279.72));
        assert_eq!(quote.upstream_amount, dec!(259));
    }

    #[test]
    fn test_plan_lookup_unknown_code() {
        let settings = setup_settings();
        let err = settings.data_quote("mtn", "mtn-100gb-365").unwrap_err();
        assert_eq!(err, RateError::UnknownPlan("mtn-100gb-365".to_string()));
    }

    #[test]
    fn test_exam_quote_multiplies_quantity() {
        let settings = setup_settings();
        let (plan, quote) = settings.exam_quote("neco", 3).unwrap();
        assert_eq!(plan.final_price(), dec!(1344.00));
        assert_eq!(quote.price, dec!(4032.00));
        assert_eq!(quote.upstream_amount, dec!(3600));
        assert_eq!(quote.margin, dec!(432.00));
    }

    #[test]
    fn test_exam_quote_zero_quantity_rejected() {
        let settings = setup_settings();
        assert_eq!(
            settings.exam_quote("waec", 0).unwrap_err(),
            RateError::ZeroQuantity
        );
    }

    // Betting: total = amount + service charge

    #[test]
    fn test_betting_fixed_charge() {
        let charge = BettingCharge {
            charge_type: ChargeType::Fixed,
            value: dec!(100),
        };
        let quote = charge.quote(dec!(2000)).unwrap();
        assert_eq!(quote.service_charge, dec!(100));
        assert_eq!(quote.total, dec!(2100));
    }

    #[test]
    fn test_betting_percent_charge() {
        let charge = BettingCharge {
            charge_type: ChargeType::Percent,
            value: dec!(1.5),
        };
        let quote = charge.quote(dec!(2000)).unwrap();
        assert_eq!(quote.service_charge, dec!(30.00));
        assert_eq!(quote.total, dec!(2030.00));
    }

    #[test]
    fn test_betting_total_always_amount_plus_charge() {
        for (charge_type, value) in [
            (ChargeType::Fixed, dec!(50)),
            (ChargeType::Fixed, dec!(0)),
            (ChargeType::Percent, dec!(2)),
            (ChargeType::Percent, dec!(0)),
        ] {
            let charge = BettingCharge { charge_type, value };
            let amount = dec!(750.25);
            let quote = charge.quote(amount).unwrap();
            assert_eq!(quote.total, amount + quote.service_charge);
        }
    }

    // Crypto: buy = live * (1 + margin/100) * fx, sell = live * (1 - margin/100) * fx

    #[test]
    fn test_crypto_buy_and_sell_prices() {
        let pricing = CryptoPricing {
            buy_margin_percent: dec!(2),
            sell_margin_percent: dec!(3),
            usd_to_ngn: dec!(1500),
        };
        let live = dec!(100);
        assert_eq!(
            pricing.unit_price(TradeSide::Buy, live).unwrap(),
            dec!(153000.00)
        );
        assert_eq!(
            pricing.unit_price(TradeSide::Sell, live).unwrap(),
            dec!(145500.00)
        );
    }

    #[test]
    fn test_crypto_buy_price_above_sell_price() {
        let settings = setup_settings();
        let live = dec!(64123.55);
        let buy = settings.crypto.unit_price(TradeSide::Buy, live).unwrap();
        let sell = settings.crypto.unit_price(TradeSide::Sell, live).unwrap();
        assert!(buy > sell);
    }

    #[test]
    fn test_crypto_total_is_units_times_unit_price() {
        let pricing = CryptoPricing {
            buy_margin_percent: dec!(2.5),
            sell_margin_percent: dec!(2.5),
            usd_to_ngn: dec!(1550),
        };
        let quote = pricing.quote(TradeSide::Buy, dec!(250), dec!(0.4)).unwrap();
        assert_eq!(quote.unit_price, dec!(397187.50));
        assert_eq!(quote.total, dec!(158875.00));
        assert_eq!(quote.total, (dec!(0.4) * quote.unit_price).round_dp(2));
    }

    #[test]
    fn test_crypto_invalid_exchange_rate() {
        let pricing = CryptoPricing {
            buy_margin_percent: dec!(2),
            sell_margin_percent: dec!(2),
            usd_to_ngn: dec!(0),
        };
        assert_eq!(
            pricing.unit_price(TradeSide::Buy, dec!(100)).unwrap_err(),
            RateError::InvalidExchangeRate(dec!(0))
        );
    }

    // Gift cards: the applicable tier is the unique [min, max] range
    // containing the amount; no tier means an error

    fn setup_card() -> GiftCardRate {
        GiftCardRate {
            brand: "amazon".to_string(),
            currency: "USD".to_string(),
            tiers: vec![
                RateTier { min: dec!(25), max: dec!(99), rate: dec!(1050) },
                RateTier { min: dec!(100), max: dec!(200), rate: dec!(1120) },
            ],
        }
    }

    #[test]
    fn test_gift_card_tier_lookup() {
        let card = setup_card();
        assert_eq!(card.tier_for(dec!(25)).unwrap().rate, dec!(1050));
        assert_eq!(card.tier_for(dec!(99)).unwrap().rate, dec!(1050));
        assert_eq!(card.tier_for(dec!(100)).unwrap().rate, dec!(1120));
        assert_eq!(card.tier_for(dec!(150)).unwrap().rate, dec!(1120));
    }

    #[test]
    fn test_gift_card_no_tier_is_an_error() {
        let card = setup_card();
        // below the lowest tier, in a gap between tiers, above the highest
        assert_eq!(
            card.tier_for(dec!(10)).unwrap_err(),
            RateError::NoTierMatch(dec!(10))
        );
        assert_eq!(
            card.tier_for(dec!(99.5)).unwrap_err(),
            RateError::NoTierMatch(dec!(99.5))
        );
        assert_eq!(
            card.tier_for(dec!(201)).unwrap_err(),
            RateError::NoTierMatch(dec!(201))
        );
    }

    #[test]
    fn test_gift_card_payout() {
        let card = setup_card();
        let quote = card.payout(dec!(50)).unwrap();
        assert_eq!(quote.rate, dec!(1050));
        assert_eq!(quote.payout, dec!(52500.00));
    }

    #[test]
    fn test_gift_card_overlapping_tiers_rejected() {
        let card = GiftCardRate {
            brand: "itunes".to_string(),
            currency: "USD".to_string(),
            tiers: vec![
                RateTier { min: dec!(25), max: dec!(100), rate: dec!(980) },
                RateTier { min: dec!(100), max: dec!(300), rate: dec!(1040) },
            ],
        };
        assert_eq!(
            card.validate().unwrap_err(),
            RateError::InvalidTier(dec!(100))
        );
    }

    #[test]
    fn test_gift_card_inverted_tier_rejected() {
        let card = GiftCardRate {
            brand: "steam".to_string(),
            currency: "USD".to_string(),
            tiers: vec![RateTier { min: dec!(100), max: dec!(50), rate: dec!(1100) }],
        };
        assert_eq!(
            card.validate().unwrap_err(),
            RateError::InvalidTier(dec!(100))
        );
    }

    #[test]
    fn test_settings_round_trip_serde() {
        let settings = setup_settings();
        let json = serde_json::to_string(&settings).unwrap();
        let back: RateSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
        assert!(back.validate().is_ok());
    }
}
