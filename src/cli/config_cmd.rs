use crate::config::RelayConfig;
use crate::discovery::Resolver;
use crate::trust;

/// Print the effective connection settings. With `resolve`, also run the
/// resolver and report whether TCP would be attempted.
pub async fn run_config(config: RelayConfig, resolve: bool) -> anyhow::Result<()> {
    println!("nook-relay configuration");
    println!("========================");
    println!("Mode:        {}", config.mode);
    println!("Socket:      {}", config.socket_path.display());
    println!(
        "Host:        {}",
        config.host.as_deref().unwrap_or("(discover, then 127.0.0.1)")
    );
    println!("Port:        {}", config.port);
    println!(
        "Token:       {}",
        if config.token.is_some() { "set" } else { "not set" }
    );
    println!("Timeout:     {}s", config.response_timeout.as_secs());
    let discovery = if config.discovery {
        config.service_type.as_str()
    } else {
        "off"
    };
    println!("Discovery:   {}", discovery);
    println!("Debug:       {}", config.debug);

    if resolve {
        let endpoint = Resolver::from_config(&config).resolve().await;
        let overlay = trust::is_overlay_address(&endpoint.host);
        let eligible = trust::remote_eligible(&endpoint.host, config.token.as_deref());
        println!();
        println!("Resolved:    {}", endpoint);
        println!("Overlay:     {}", overlay);
        println!("TCP attempt: {}", if eligible { "yes" } else { "no" });
    }
    Ok(())
}
