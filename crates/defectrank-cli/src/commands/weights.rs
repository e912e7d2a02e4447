pub fn run(data_dir: &str, state_path: &str, limit: usize, json: bool) {
    let data = super::load_dataset(data_dir);
    let model = super::load_model(state_path, &data.catalog);
    let table = model.weights();

    if json {
        super::print_json(&table);
        return;
    }

    let info = model.info();
    println!("{} model: {} ({})", info.name, info.measure, info.context);
    if table.is_empty() {
        println!("  (no learned weights yet)");
        return;
    }

    print!("  {:<16} {:>8}", "Context", "Traffic");
    for column in &table.columns {
        print!(" {:>12.12}", column);
    }
    println!();
    println!("  {}", "-".repeat(26 + 13 * table.columns.len()));
    for (key, row) in table.rows.iter().take(limit) {
        let traffic = table.traffic.get(key).copied().unwrap_or(0.0);
        print!("  {:<16.16} {:>8.0}", key, traffic);
        for value in row {
            print!(" {:>12.4}", value);
        }
        println!();
    }
    if table.rows.len() > limit {
        println!("  ... {} more rows (use --limit or --json)", table.rows.len() - limit);
    }
}
