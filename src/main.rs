use log::info;
use uom::si::{
    area::square_meter, heat_capacity::joule_per_kelvin, heat_transfer::watt_per_square_meter_kelvin,
    thermal_conductance::watt_per_kelvin,
};

use envelope_rc::{Building, RcNetwork};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "model.json5".into());
    let mut building = Building::load(&path)?;
    info!("Loaded {} zones from {}", building.zones().count(), path);

    building.calc_all()?;

    for (id, element) in building.elements() {
        let Some(area) = element.area() else {
            continue;
        };
        let circuit = element.circuit();
        println!(
            "{}: A = {:.2} m^2, U = {:.3} W/(m^2.K), UA = {:.3} W/K, R1 = {:.5} K/W, C1 = {:.0} J/K, C = {:.0} J/K",
            building.element_label(id)?,
            area.get::<square_meter>(),
            element.u_value().get::<watt_per_square_meter_kelvin>(),
            element.ua_value().get::<watt_per_kelvin>(),
            circuit.r1,
            circuit.c1.get::<joule_per_kelvin>(),
            element.heat_capacity().get::<joule_per_kelvin>(),
        );
    }

    let network = RcNetwork::try_from(&building)?;
    println!("{}", network.to_dot());

    Ok(())
}
