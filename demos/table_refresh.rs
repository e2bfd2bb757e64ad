//! Table refresh: deliver three renderings of one page and show what goes
//! over the wire each time.
//!
//! Run with `cargo run --example table_refresh`.

use response_diff::{DiffConfig, PageSession, Response, ResponseAssembler};

fn render(title: &str, people: &[(&str, &str)]) -> response_diff::Result<Response> {
    let mut page = ResponseAssembler::new(DiffConfig::default());
    page.append_text("<html><head>")?;
    page.push_buffer("title", false, false)?;
    page.append_text(&format!("<title>{title}</title>"))?;
    page.pop_buffer(true)?;
    page.append_text("</head><body>\n  <table>\n")?;
    page.push_buffer("people", true, false)?;
    for (id, name) in people {
        page.append_text("    ")?;
        page.push_buffer(*id, false, false)?;
        page.append_text(&format!("<tr><td>{name}</td></tr>"))?;
        page.pop_buffer(false)?;
        page.append_text("\n")?;
    }
    page.pop_buffer(false)?;
    page.append_text("  </table>\n</body></html>")?;
    page.finish()
}

fn main() -> response_diff::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let renderings = [
        render("People", &[("r1", "Alice"), ("r2", "Bob")])?,
        render("People", &[("r1", "Alice"), ("r3", "Carol"), ("r2", "Bob")])?,
        render("People", &[("r1", "Alice"), ("r3", "Caroline")])?,
    ];

    let mut session = PageSession::new();
    for (i, response) in renderings.into_iter().enumerate() {
        let mut wire = Vec::new();
        let stats = session.deliver(response, &mut wire)?;
        println!("Delivery {}", i + 1);
        println!("==========");
        println!("{}", String::from_utf8_lossy(&wire));
        println!(
            "({} bytes, {} inserted, {} updated, {} deleted)",
            stats.bytes_written, stats.rows_inserted, stats.rows_updated, stats.rows_deleted
        );
        println!();
    }
    Ok(())
}
