use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Occurrence counts keyed by (true label, predicted label)
pub type ConfusionCounts = HashMap<(String, String), usize>;

/// Build the confusion matrix as an (n+1) x (n+1) table of strings.
///
/// `labels` is deduplicated preserving first-seen order; row 0 and column 0
/// hold the header labels with an empty corner cell, and cell [i+1][j+1] is
/// the count for (labels[i], labels[j]), "0" when the pair never occurred.
/// Predicted labels that never appeared as true labels get no column.
pub fn build_confusion_table(labels: &[String], counts: &ConfusionCounts) -> Vec<Vec<String>> {
    let mut distinct: Vec<String> = Vec::new();
    for label in labels {
        if !distinct.contains(label) {
            distinct.push(label.clone());
        }
    }

    let n = distinct.len();
    let mut table = vec![vec![String::new(); n + 1]; n + 1];

    for (i, label) in distinct.iter().enumerate() {
        table[0][i + 1] = label.clone();
        table[i + 1][0] = label.clone();
    }

    for (i, true_label) in distinct.iter().enumerate() {
        for (j, predicted_label) in distinct.iter().enumerate() {
            let count = counts
                .get(&(true_label.clone(), predicted_label.clone()))
                .copied()
                .unwrap_or(0);
            table[i + 1][j + 1] = count.to_string();
        }
    }

    table
}

/// Print the table column-aligned, one row per line
pub fn pretty_print_table(table: &[Vec<String>]) {
    println!("--------------------------------------------------------------");
    for row in table {
        for cell in row {
            print!("{:<20}", cell);
        }
        println!();
        println!();
    }
}

/// Save the raw table as CSV, replacing any previous file
pub fn save_table_csv(table: &[Vec<String>], output_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if output_path.exists() {
        fs::remove_file(output_path)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(output_path)?;
    for row in table {
        writer.write_record(row)?;
    }
    writer.flush()?;

    println!("Confusion matrix saved to: {}", output_path.display());
    Ok(())
}

/// Re-parse a table previously written by `save_table_csv`
pub fn load_table_csv(path: &Path) -> Result<Vec<Vec<String>>, Box<dyn std::error::Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut table = Vec::new();
    for result in reader.records() {
        let record = result?;
        table.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(table)
}

/// Save the confusion counts as a heatmap using Plotters
pub fn save_heatmap_png(
    labels: &[String],
    counts: &ConfusionCounts,
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    use plotters::prelude::*;

    let n = labels.len();
    if n == 0 {
        return Err("No labels to plot".into());
    }

    let max_count = counts.values().copied().max().unwrap_or(0).max(1) as f64;

    // Determine appropriate dimensions
    let side = std::cmp::max(600, 120 + n * 60) as u32;

    let root = BitMapBackend::new(output_path, (side, side)).into_drawing_area();
    root.fill(&WHITE)?;

    // Calculate margins based on the longest label
    let max_label_len = labels.iter().map(|label| label.len()).max().unwrap_or(10);
    let margin = std::cmp::max(50, (max_label_len * 8) as i32);

    let mut chart = ChartBuilder::on(&root)
        .caption("Confusion Matrix", ("sans-serif", 28).into_font())
        .margin(10)
        .x_label_area_size(margin)
        .y_label_area_size(margin)
        .build_cartesian_2d(0..n, (0..n).into_segmented())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&|x| {
            if *x < n {
                labels[*x].clone()
            } else {
                String::new()
            }
        })
        .y_label_formatter(&|y| {
            if let SegmentValue::Exact(y) = y {
                if *y < n {
                    return labels[*y].clone();
                }
            }
            String::new()
        })
        .draw()?;

    let heatmap_gradient = colorous::VIRIDIS;

    for i in 0..n {
        for j in 0..n {
            let count = counts
                .get(&(labels[i].clone(), labels[j].clone()))
                .copied()
                .unwrap_or(0);

            let color = heatmap_gradient.eval_continuous(count as f64 / max_count);
            let cell_color = RGBColor(color.r, color.g, color.b);

            chart.draw_series(std::iter::once(Rectangle::new(
                [
                    (j, SegmentValue::Exact(i)),
                    (j + 1, SegmentValue::Exact(i + 1)),
                ],
                cell_color.filled(),
            )))?;
        }
    }

    root.present()?;

    println!("Confusion heatmap saved to: {}", output_path.display());
    Ok(())
}
