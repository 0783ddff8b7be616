// generate_key.rs
// Utility to generate a fresh JWT signing secret

use rand::distributions::Alphanumeric;
use rand::Rng;

fn main() {
    println!("Generating new JWT signing secret...\n");

    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();

    println!("✅ Secret generated successfully!\n");
    println!("Add this to your .env file:");
    println!("─────────────────────────────────────────────────");
    println!("JWT_SECRET={}", secret);
    println!("─────────────────────────────────────────────────");
    println!("\n⚠️  IMPORTANT:");
    println!("  • Keep this secret secure and never commit it to version control");
    println!("  • Rotating it signs every outstanding session out");
}
