use anyhow::Context;
use flotilla_client::{ClientConfig, Gateway};
use flotilla_core::Instance;
use flotilla_ui::App;

/// Run the interactive console until the operator quits.
pub async fn console(config: ClientConfig, archived: bool) -> anyhow::Result<()> {
    let mut app = App::new(config).context("building the console")?;
    app.set_show_archived(archived);
    app.run().await.context("running the console")?;
    Ok(())
}

/// One-shot fleet summary for scripting and quick checks.
pub async fn sites(
    config: &ClientConfig,
    name: Option<&str>,
    archived: bool,
) -> anyhow::Result<()> {
    let gateway = Gateway::new(config)?;
    let rows = gateway
        .fleet_summary(name, archived)
        .await
        .context("fetching the fleet summary")?;

    println!(
        "{:<28} {:<14} {:<10} {:<12} {:>10}",
        "NAME", "BUILD", "DB", "SOURCE", "DURATION"
    );
    for row in &rows {
        println!("{}", format_site_row(row));
    }
    Ok(())
}

fn format_site_row(row: &Instance) -> String {
    format!(
        "{:<28} {:<14} {:<10} {:<12} {:>9}s",
        row.name, row.build_state, row.db_size_humanize, row.source_size_humanize, row.duration
    )
}

/// List the snapshots instances can be rebuilt from.
pub async fn dumps(config: &ClientConfig) -> anyhow::Result<()> {
    let gateway = Gateway::new(config)?;
    let dumps = gateway
        .possible_dumps()
        .await
        .context("fetching the dump list")?;
    for dump in dumps {
        println!("{}", dump.value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_row_formatting() {
        let row = Instance {
            name: "br-feature-x".into(),
            build_state: "OK".into(),
            db_size_humanize: "1.2 GB".into(),
            source_size_humanize: "340 MB".into(),
            duration: 95,
            ..Instance::default()
        };
        let line = format_site_row(&row);
        assert!(line.starts_with("br-feature-x"));
        assert!(line.contains("1.2 GB"));
        assert!(line.ends_with("95s"));
    }
}
