use super::ui;
use crate::core::error::FetchError;
use crate::core::quote::{QuoteRecord, QuoteRequest, QuoteResult};
use crate::service::QuoteService;
use anyhow::Result;
use chrono::Local;
use comfy_table::Cell;

const HISTORY_ROWS: usize = 10;

pub async fn run(service: &QuoteService, requests: Vec<QuoteRequest>, show_history: bool) -> Result<()> {
    if requests.is_empty() {
        println!("No symbols given.");
        return Ok(());
    }

    let pb = ui::new_progress_bar(requests.len() as u64);
    pb.set_message("Fetching quotes");
    let results = service
        .fetch_batch_with_progress(requests, |request| {
            pb.set_message(request.symbol.clone());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Price"),
        ui::header_cell("Change"),
        ui::header_cell("Change %"),
        ui::header_cell("Volume"),
        ui::header_cell("Market"),
        ui::header_cell("Status"),
        ui::header_cell("Source"),
    ]);

    let mut failures: Vec<(String, FetchError)> = Vec::new();
    let mut records: Vec<QuoteRecord> = Vec::new();
    for (request, result) in results {
        match result {
            Ok(QuoteResult { data, source }) => {
                table.add_row(vec![
                    Cell::new(&data.symbol),
                    ui::number_cell(data.price),
                    ui::change_cell(data.change, ""),
                    ui::change_cell(data.change_percent, "%"),
                    ui::format_optional_cell(data.volume, |v| v.to_string()),
                    ui::market_state_cell(data.market_state),
                    ui::status_cell(data.status),
                    Cell::new(source.as_str()),
                ]);
                records.push(data);
            }
            Err(e) => failures.push((request.symbol, e)),
        }
    }

    if !records.is_empty() {
        println!("{table}");
    }

    if show_history {
        for record in &records {
            print_history(record);
        }
    }

    if !failures.is_empty() {
        println!("\n{}", ui::style_text("Failed:", ui::StyleType::TotalLabel));
        for (symbol, error) in &failures {
            println!(
                "  {} {}",
                symbol,
                ui::style_text(&error.to_string(), ui::StyleType::Error)
            );
        }
    }

    Ok(())
}

fn print_history(record: &QuoteRecord) {
    println!(
        "\n{}",
        ui::style_text(&format!("{} history", record.symbol), ui::StyleType::Title)
    );
    if record.history.is_empty() {
        println!(
            "{}",
            ui::style_text("No history available from this source", ui::StyleType::Subtle)
        );
        return;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Time"),
        ui::header_cell("Open"),
        ui::header_cell("High"),
        ui::header_cell("Low"),
        ui::header_cell("Close"),
        ui::header_cell("Volume"),
    ]);
    let skip = record.history.len().saturating_sub(HISTORY_ROWS);
    for candle in record.history.iter().skip(skip) {
        table.add_row(vec![
            Cell::new(candle.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
            ui::number_cell(candle.open),
            ui::number_cell(candle.high),
            ui::number_cell(candle.low),
            ui::number_cell(candle.close),
            ui::format_optional_cell(candle.volume, |v| v.to_string()),
        ]);
    }
    println!("{table}");
}
