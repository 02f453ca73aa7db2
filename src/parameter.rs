//! Tagged `Parameter` variants plus `apply`, replacing a string-keyed
//! dispatch. Validation happens once at parse time; `Simulator::set_parameter`
//! never re-validates.

use serde::Serialize;

use crate::config::Config;
use crate::error::ParameterError;

/// The simulation's current parameter set, echoed verbatim in every
/// published `SimResult`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct Parameters {
    pub exchange: String,
    pub spot_asset: String,
    pub order_type: String,
    pub quantity_usd: f64,
    pub volatility: f64,
    pub fee_tier: String,
}

impl Parameters {
    pub fn from_config(config: &Config) -> Self {
        Self {
            exchange: config.default_exchange.clone(),
            spot_asset: config.default_spot_asset.clone(),
            order_type: config.default_order_type.clone(),
            quantity_usd: config.default_quantity_usd,
            volatility: config.default_volatility,
            fee_tier: config.default_fee_tier.clone(),
        }
    }
}

/// A validated, single parameter-change request.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Exchange(String),
    SpotAsset(String),
    OrderType(String),
    Quantity(f64),
    Volatility(f64),
    FeeTier(String),
}

impl Parameter {
    /// Validate `name`/`value` against the recognised set
    /// (`exchange, spot_asset, order_type, quantity, volatility, fee_tier`).
    /// Unrecognised names and malformed values fail softly with the
    /// original parameters left untouched by the caller.
    pub fn parse(name: &str, value: &serde_json::Value) -> Result<Parameter, ParameterError> {
        let as_str = |name: &'static str| -> Result<String, ParameterError> {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ParameterError::InvalidValue {
                    name,
                    reason: "expected a string".to_string(),
                })
        };
        let as_f64 = |name: &'static str| -> Result<f64, ParameterError> {
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok()))
                .ok_or_else(|| ParameterError::InvalidValue {
                    name,
                    reason: "expected a number".to_string(),
                })
        };

        match name {
            "exchange" => Ok(Parameter::Exchange(as_str("exchange")?)),
            "spot_asset" => Ok(Parameter::SpotAsset(as_str("spot_asset")?)),
            "order_type" => {
                let order_type = as_str("order_type")?;
                if order_type != "market" {
                    return Err(ParameterError::InvalidValue {
                        name: "order_type",
                        reason: "only \"market\" is supported".to_string(),
                    });
                }
                Ok(Parameter::OrderType(order_type))
            }
            "quantity" => {
                let quantity = as_f64("quantity")?;
                if !(quantity > 0.0) {
                    return Err(ParameterError::InvalidValue {
                        name: "quantity",
                        reason: "must be positive".to_string(),
                    });
                }
                Ok(Parameter::Quantity(quantity))
            }
            "volatility" => {
                let volatility = as_f64("volatility")?;
                if !(0.0..=1.0).contains(&volatility) {
                    return Err(ParameterError::InvalidValue {
                        name: "volatility",
                        reason: "must be in [0, 1]".to_string(),
                    });
                }
                Ok(Parameter::Volatility(volatility))
            }
            "fee_tier" => Ok(Parameter::FeeTier(as_str("fee_tier")?)),
            other => Err(ParameterError::UnknownName(other.to_string())),
        }
    }

    /// Apply this change to a live parameter set.
    pub fn apply(self, params: &mut Parameters) {
        match self {
            Parameter::Exchange(v) => params.exchange = v,
            Parameter::SpotAsset(v) => params.spot_asset = v,
            Parameter::OrderType(v) => params.order_type = v,
            Parameter::Quantity(v) => params.quantity_usd = v,
            Parameter::Volatility(v) => params.volatility = v,
            Parameter::FeeTier(v) => params.fee_tier = v,
        }
    }

    /// The wire name this variant was parsed from, for echoing back in
    /// HTTP responses.
    pub fn name(&self) -> &'static str {
        match self {
            Parameter::Exchange(_) => "exchange",
            Parameter::SpotAsset(_) => "spot_asset",
            Parameter::OrderType(_) => "order_type",
            Parameter::Quantity(_) => "quantity",
            Parameter::Volatility(_) => "volatility",
            Parameter::FeeTier(_) => "fee_tier",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unrecognized_name_fails_softly() {
        let err = Parameter::parse("leverage", &json!(5)).unwrap_err();
        assert_eq!(err, ParameterError::UnknownName("leverage".to_string()));
    }

    #[test]
    fn quantity_must_be_positive() {
        let err = Parameter::parse("quantity", &json!(-10.0)).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidValue { name: "quantity", .. }));
    }

    #[test]
    fn quantity_accepts_numeric_string() {
        let parsed = Parameter::parse("quantity", &json!("200.0")).unwrap();
        assert_eq!(parsed, Parameter::Quantity(200.0));
    }

    #[test]
    fn order_type_rejects_non_market() {
        let err = Parameter::parse("order_type", &json!("limit")).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidValue { name: "order_type", .. }));
    }

    #[test]
    fn apply_updates_the_right_field() {
        let mut params = Parameters {
            exchange: "OKX".into(),
            spot_asset: "BTC-USDT".into(),
            order_type: "market".into(),
            quantity_usd: 100.0,
            volatility: 0.02,
            fee_tier: "VIP0".into(),
        };
        Parameter::Quantity(200.0).apply(&mut params);
        assert_eq!(params.quantity_usd, 200.0);
    }
}
