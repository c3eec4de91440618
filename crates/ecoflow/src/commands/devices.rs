//! Device list handler.

use tabled::Tabled;

use ecoflow_core::{Controller, Device};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "Online")]
    online: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            serial: d.serial.clone(),
            name: d.name.clone().unwrap_or_default(),
            product: d.product.clone().unwrap_or_default(),
            online: if d.online { "yes" } else { "no" }.into(),
        }
    }
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = controller.refresh_devices().await?;
    let out = output::render_list(&global.output, devices.as_slice(), |d| DeviceRow::from(d))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
