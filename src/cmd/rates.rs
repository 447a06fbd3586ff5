use super::RatesAction;
use crate::rates::{
    load_rate_table, resolve_booking_rate, resolve_preview, BookingRateRequest, FallbackPolicy, PreviewRequest,
};

pub fn run(action: RatesAction) -> anyhow::Result<()> {
    match action {
        RatesAction::Preview {
            rates,
            driver_class,
            start,
            end,
            night,
            strict,
            json,
        } => {
            let table = load_rate_table(&rates)?;
            let request = PreviewRequest {
                start_date: Some(start),
                end_date: Some(end),
                driver_class: Some(driver_class.clone()),
                is_night_shift: night,
            };
            let policy = if strict {
                FallbackPolicy::Strict
            } else {
                FallbackPolicy::WeekdayFallback
            };

            let Some(preview) = resolve_preview(&request, &table, policy) else {
                if json {
                    println!("null");
                } else {
                    eprintln!(
                        "No rate preview: driver class '{}' has no applicable rates for {} to {}",
                        driver_class, start, end
                    );
                }
                std::process::exit(1);
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
                return Ok(());
            }

            println!(
                "{} ({} shift)",
                preview.driver_class,
                if preview.is_night_shift { "night" } else { "day" }
            );
            println!();
            println!(
                "{:<12} {:<10} {:<22} {:>10} {:>10} {:>10}",
                "Date", "Day", "Rate", "Charge", "Pay", "Margin"
            );
            for day in &preview.days {
                println!(
                    "{:<12} {:<10} {:<22} {:>10} {:>10} {:>10}",
                    day.date.to_string(),
                    day.day_name,
                    day.rate_name,
                    day.charge_rate.to_string(),
                    day.pay_rate.to_string(),
                    day.margin.to_string()
                );
            }
            println!();
            println!(
                "{:<46} {:>10} {:>10} {:>10}",
                format!("Total ({} days)", preview.total_days),
                preview.total_charge_rate.to_string(),
                preview.total_pay_rate.to_string(),
                preview.total_margin.to_string()
            );
            Ok(())
        }
        RatesAction::Booking {
            rates,
            customer,
            driver_class,
            day_type,
            night,
            date,
            json,
        } => {
            let table = load_rate_table(&rates)?;
            let request = BookingRateRequest {
                customer_id: customer.clone(),
                driver_class: driver_class.clone(),
                is_night_shift: night,
                day_type,
                date,
            };

            let Some(rate) = resolve_booking_rate(&request, &table) else {
                if json {
                    println!("null");
                } else {
                    eprintln!(
                        "No rate preview: customer '{}' has no matching rate for driver class '{}'",
                        customer, driver_class
                    );
                }
                std::process::exit(1);
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&rate)?);
            } else {
                println!("{} ({})", rate.rate_name, rate.rate_category);
                println!("  Charge: {}", rate.charge_rate);
                println!("  Pay:    {}", rate.pay_rate);
                println!("  Margin: {}", rate.margin);
            }
            Ok(())
        }
    }
}
