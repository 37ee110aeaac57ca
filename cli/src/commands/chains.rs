use crate::commands::CommandResult;
use colored::*;
use cross_chain_bridge::{BridgeSettings, Chain, MinimumAmountPolicy};
use prettytable::{Cell, Row, Table};

pub fn list(settings: &BridgeSettings) -> CommandResult<()> {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Chain"),
        Cell::new("Chain ID"),
        Cell::new("Provider ID"),
        Cell::new("Native"),
        Cell::new("RPC"),
    ]));
    for chain in Chain::ALL {
        table.add_row(Row::new(vec![
            Cell::new(chain.name()),
            Cell::new(&chain.native_id().to_string()),
            Cell::new(&chain.provider_id().to_string()),
            Cell::new(chain.native_symbol()),
            Cell::new(settings.rpc_url(chain).unwrap_or("-")),
        ]));
    }

    println!("\n{}", "Supported Chains".bold());
    table.printstd();
    println!("Gateway transfers: Ethereum <-> Sonic only.");
    Ok(())
}

pub fn minimum(settings: &BridgeSettings, from: &str, to: &str, token: &str) -> CommandResult<()> {
    let from: Chain = from.parse()?;
    let to: Chain = to.parse()?;
    let policy = MinimumAmountPolicy::with_rules(&settings.minimum_rules);
    let minimum = policy.minimum_amount(from, to, token);
    println!(
        "Minimum {} transfer from {} to {}: {}",
        token.trim().to_uppercase(),
        from,
        to,
        minimum.to_string().green()
    );
    Ok(())
}
