use super::ui;
use crate::ledger::SuccessRate;
use crate::service::QuoteService;
use anyhow::Result;
use comfy_table::Cell;

pub async fn run(service: &QuoteService, hours: i64) -> Result<()> {
    let rate = service.success_rate(hours).await;
    println!("{}", render(&rate, hours));
    Ok(())
}

fn render(rate: &SuccessRate, hours: i64) -> comfy_table::Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Window"),
        ui::header_cell("Requests"),
        ui::header_cell("Successful"),
        ui::header_cell("Success rate"),
    ]);
    table.add_row(vec![
        Cell::new(format!("{hours}h")),
        Cell::new(rate.total),
        Cell::new(rate.successful),
        ui::format_optional_cell(Some(rate.rate), |r| format!("{r:.2}%")),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_stats_table() {
        let rate = SuccessRate {
            rate: 66.67,
            total: 3,
            successful: 2,
        };
        let output = render(&rate, 24).to_string();
        assert!(output.contains("24h"));
        assert!(output.contains("66.67%"));
    }
}
