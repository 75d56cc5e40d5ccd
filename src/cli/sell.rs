//! Sell command

use clap::Args;
use serde_json::json;
use tracing::warn;

use super::{Cli, CliError, OutputFormat};
use crate::market::{MarketClient, MarketError};
use crate::InventoryItem;

/// Arguments for selling an item
#[derive(Args, Debug)]
pub struct SellArgs {
    /// App id of the item
    #[arg(long)]
    pub app_id: u32,

    /// Inventory context of the item
    #[arg(long, default_value_t = 2)]
    pub context_id: u32,

    /// Asset id of the item
    #[arg(long)]
    pub asset_id: String,

    /// Amount the seller receives, in cents
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub price: u64,

    /// Market hash name, for logs only
    #[arg(long, default_value = "")]
    pub name: String,
}

impl SellArgs {
    /// Inventory item described by the arguments
    pub fn item(&self) -> InventoryItem {
        InventoryItem {
            asset_id: self.asset_id.clone(),
            context_id: self.context_id,
            instance_id: "0".to_string(),
            app_id: self.app_id,
            market_hash_name: self.name.clone(),
            marketable: true,
        }
    }

    /// Execute the sell command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let item = self.item();
        item.validate().map_err(CliError::InvalidArgument)?;

        let market = MarketClient::new(cli.executor()?);
        let receipt = match market.sell_item(&item, self.price).await {
            Ok(receipt) => receipt,
            Err(MarketError::Sell(e)) if e.item_not_in_inventory => {
                warn!(item = %item, "Item is no longer in the inventory");
                return Err(MarketError::Sell(e).into());
            }
            Err(e) => return Err(e.into()),
        };

        match cli.output_format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "asset_id": item.asset_id,
                    "app_id": item.app_id,
                    "price": self.price,
                    "requires_confirmation": receipt.requires_confirmation,
                    "needs_mobile_confirmation": receipt.needs_mobile_confirmation,
                    "needs_email_confirmation": receipt.needs_email_confirmation,
                })
            ),
            OutputFormat::Human => {
                println!("Listed {item} for {} cents", self.price);
                if receipt.requires_confirmation {
                    println!("  Confirmation required before the listing goes live");
                }
            }
        }
        Ok(())
    }
}
