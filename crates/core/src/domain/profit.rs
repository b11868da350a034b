// Profit / Fee Formula
//
// External contract consumed by the operator UI. Pure and stateless; kept
// here so the arithmetic is reproduced exactly wherever the UI is rebuilt.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfitInputs {
    pub purchase_price: f64,
    pub shipping_cost: f64,
    pub order_fee: f64,
    pub storage_fee: f64,
    pub sale_price: f64,
    pub commission_pct: f64,
    pub vat_pct: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfitBreakdown {
    pub total_cost: f64,
    pub profit: f64,
    /// Percent. 0 when sale_price is 0 or unset.
    pub margin_pct: f64,
}

pub fn calculate_profit(inputs: &ProfitInputs) -> ProfitBreakdown {
    let total_cost = inputs.purchase_price
        + inputs.shipping_cost
        + inputs.order_fee
        + inputs.storage_fee
        + inputs.sale_price * (inputs.commission_pct / 100.0)
        + inputs.sale_price * (inputs.vat_pct / 100.0);

    let profit = inputs.sale_price - total_cost;

    let margin_pct = if inputs.sale_price > 0.0 {
        profit / inputs.sale_price * 100.0
    } else {
        0.0
    };

    ProfitBreakdown {
        total_cost,
        profit,
        margin_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn reference_vector() {
        let result = calculate_profit(&ProfitInputs {
            purchase_price: 10.0,
            shipping_cost: 2.0,
            order_fee: 1.0,
            storage_fee: 0.5,
            sale_price: 30.0,
            commission_pct: 10.0,
            vat_pct: 19.0,
        });

        // 10 + 2 + 1 + 0.5 + 3 + 5.7
        assert!(approx(result.total_cost, 22.2));
        assert!(approx(result.profit, 7.8));
        assert!(approx(result.margin_pct, 26.0));
    }

    #[test]
    fn zero_sale_price_yields_zero_margin() {
        let result = calculate_profit(&ProfitInputs {
            purchase_price: 10.0,
            shipping_cost: 2.0,
            order_fee: 1.0,
            storage_fee: 0.5,
            sale_price: 0.0,
            commission_pct: 10.0,
            vat_pct: 19.0,
        });

        assert!(approx(result.margin_pct, 0.0));
        assert!(result.profit < 0.0);
    }
}
