use crate::models::{Catalog, ColourStop};
use crate::utils::style::NdviRamp;
use comfy_table::{Attribute, Cell, CellAlignment, Table};

/// Cloud cover above this gets flagged in the summary.
const CLOUDY_PERCENT: u8 = 30;

fn header(title: &str) -> Cell {
    Cell::new(title)
        .add_attribute(Attribute::Bold)
        .set_alignment(CellAlignment::Center)
}

/// Colourbar of `n` blocks sampled across NDVI -1..1.
pub fn colour_bar(ramp: &NdviRamp, n: usize) -> String {
    let n = n.max(2);
    let mut s = String::new();
    for i in 0..n {
        let t = i as f32 / (n - 1) as f32;
        let [r, g, b, _] = ramp.colour_at(-1.0 + 2.0 * t);
        s.push_str(&format!("\x1b[38;2;{};{};{}m█\x1b[0m", r, g, b));
    }
    s
}

fn stop_swatch(stop: &ColourStop) -> String {
    format!(
        "\x1b[38;2;{};{};{}m█\x1b[0m",
        stop.red, stop.green, stop.blue
    )
}

pub fn catalog_table(catalog: &Catalog) -> Table {
    let mut table = Table::new();
    table
        .set_header(vec![
            header(""),
            header("Product"),
            header("Date"),
            header("Cloud"),
            header("COG URL"),
        ])
        .load_preset(comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED);

    for product in catalog {
        let flag = if product.cloud_cover > CLOUDY_PERCENT {
            "☁️"
        } else {
            "✅"
        };
        table.add_row(vec![
            Cell::new(flag).set_alignment(CellAlignment::Center),
            Cell::new(&product.name),
            Cell::new(&product.date).set_alignment(CellAlignment::Center),
            Cell::new(format!("{}%", product.cloud_cover)).set_alignment(CellAlignment::Right),
            Cell::new(&product.url),
        ]);
    }
    table
}

pub fn print_catalog_summary(catalog: &Catalog, ramp: &NdviRamp) {
    if catalog.is_empty() {
        println!("\n{}\n", catalog.summary());
        return;
    }

    println!("\n{}:\n{}", catalog.summary(), catalog_table(catalog));

    let breaks = ramp
        .stops()
        .iter()
        .map(|s| format!("{:.2}", s.value))
        .collect::<Vec<_>>()
        .join(", ");
    let swatches: String = ramp.stops().iter().map(stop_swatch).collect();
    println!("\nNDVI ramp: {} [{}]", swatches, breaks);
    println!("  -1 {} 1", colour_bar(ramp, 20));

    let cloudy: Vec<_> = catalog
        .iter()
        .filter(|p| p.cloud_cover > CLOUDY_PERCENT)
        .collect();
    if !cloudy.is_empty() {
        println!("\nWarnings:");
        for p in cloudy {
            println!(
                "  ⚠️{}: {}% cloud cover, imagery may be obscured",
                p.name, p.cloud_cover
            );
        }
    }
    println!();
}
