//! Run the three wizard steps from the command line.
//!
//! Requires `GEMINI_API_KEY` in the environment.
//!
//! ```sh
//! cargo run --example try_on -- p1 g3
//! cargo run --example try_on -- ./me.jpg "prompt:red silk gown"
//! ```
//!
//! The first argument is a person preset id or an image path. The second is
//! a garment preset id, an image path, or `prompt:<description>`.

use std::path::Path;

use tracing_subscriber::EnvFilter;
use virtual_tryon::{Session, TryOnConfig};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let person_arg = args.next().unwrap_or_else(|| "p1".to_string());
    let garment_arg = args.next().unwrap_or_else(|| "g1".to_string());

    let session = Session::gemini(TryOnConfig::from_env()?)?;

    // Step 1
    if session.catalog().person(&person_arg).is_some() {
        session.choose_preset_person(&person_arg)?;
    } else {
        session.upload_person(Path::new(&person_arg)).await?;
    }
    session.advance_to_garment()?;
    println!("Person selected");

    // Step 2
    if let Some(description) = garment_arg.strip_prefix("prompt:") {
        println!("Generating garment: {}", description);
        let garment = session.generate_garment(description).await?;
        let file = virtual_tryon::DownloadFile::for_result(&garment)?;
        let name = format!("garment-{}", file.file_name);
        std::fs::write(&name, &file.bytes)?;
        println!("Saved generated garment: {}", name);
    } else if session.catalog().garment(&garment_arg).is_some() {
        session.choose_preset_garment(&garment_arg)?;
    } else {
        session.upload_garment(Path::new(&garment_arg)).await?;
    }
    println!("Garment selected");

    // Step 3
    println!("Generating try-on result...");
    match session.enter_result_step().await {
        Ok(Some(_)) => {
            let file = session.download_result()?;
            std::fs::write(&file.file_name, &file.bytes)?;
            println!("Saved: {}", file.file_name);
        }
        Ok(None) => eprintln!("No result was produced"),
        Err(e) => eprintln!("Try-on failed: {}", e),
    }

    for entry in session.history().iter() {
        println!("History {} at {}", entry.id, entry.created_at);
    }

    Ok(())
}
