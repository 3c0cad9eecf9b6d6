use addrnorm::Postal;

fn main() {
    pretty_env_logger::init();

    let postal = Postal::new();

    println!("=== Address parsing ===\n");

    let test_cases = vec![
        // US
        "1600 Pennsylvania Avenue NW, Washington, DC 20500",
        "123 Main St Apt 4, San Francisco, CA 94102",
        "PO Box 12, Springfield, IL 62701",
        "Empire State Building, 350 5th Ave, New York, NY 10118",
        // Europe
        "4 Rue de la Paix, 75002 Paris, France",
        "Hauptstraße 10, 10115 Berlin, Deutschland",
        "Calle Mayor 5, 28013 Madrid, España",
        // nothing to parse
        "",
    ];

    for addr in test_cases {
        let parsed = postal.parse_address(addr);
        println!("input: \"{}\"", addr);
        for span in &parsed.spans {
            println!("  {:<12} {:?} ({:.2})", span.label.as_str(), span.text, span.confidence);
        }
        println!("  complete: {}", parsed.is_complete());
        println!();
    }

    println!("=== Expansion ===\n");

    for addr in ["123 Main St Apt 4", "12 Av. des Champs-Élysées", "Hauptstr. 5"] {
        let expansions = postal.expand_address(addr);
        println!("{} ({} variants)", addr, expansions.len());
        for variant in expansions.iter().take(10) {
            println!("  {}", variant);
        }
        println!();
    }

    println!("=== Duplicates ===\n");

    let pairs = [
        ("123 Main Street Apt 4", "123 Main St. #4"),
        ("123 Main St, San Francisco, CA", "123 Main Street, San Fransisco, California"),
        ("123 Main St, Springfield", "123 Main St, Springfield, IL 62701"),
        ("123 Main St Apt 4", "456 Oak Avenue"),
    ];
    for (a, b) in pairs {
        println!("{:?} vs {:?} => {:?}", a, b, postal.duplicate_status(a, b));
    }

    let addresses = ["123 Main Street Apt 4", "123 Main St. #4", "456 Oak Avenue", "456 Oak Ave"];
    println!();
    for group in postal.dedupe(&addresses) {
        let members: Vec<&str> = group.members.iter().map(|&i| addresses[i]).collect();
        println!("group: {:?}", members);
    }
}
