use defectrank_core::ModelKind;

pub fn run() {
    println!("{} scoring models:\n", ModelKind::ALL.len());
    println!("  {:<28} {:<10} {:<6} Description", "Name", "Context", "Scale");
    println!("  {}", "-".repeat(90));
    for kind in ModelKind::ALL {
        let info = kind.info();
        println!(
            "  {:<28} {:<10} {:<6} {}",
            info.name,
            info.context.to_string(),
            info.scale.to_string(),
            info.description
        );
    }
    println!("\nTrain one with: defectrank train --data <dir> --model <name> --output <file>");
}
