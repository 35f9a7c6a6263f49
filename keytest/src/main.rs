use keyclock_gpio::debounce::PressEdge;
use keyclock_gpio::gpiod::GpiodDriver;
use keyclock_gpio::keypad::{Keypad, KeypadGrid, MatrixKeypad};
use keyclock_gpio::{GpioActiveLevel, GpioBias, GpioDriveMode, GpioDriver, GpioInput, GpioOutput, GpioResult};
use dotenv::{dotenv, var};
use log::{debug, info, warn};
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

fn parse_pin_list(pin_str: &str) -> eyre::Result<Vec<usize>> {
    let pins = pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?;
    if pins.is_empty() {
        eyre::bail!("No pins given");
    }
    Ok(pins)
}

/// Labels of the keys found pressed on the last scan, in scan order.
fn held_labels(keypad: &MatrixKeypad<'_>) -> String {
    keypad
        .debounce_state()
        .pressed_cells()
        .filter_map(|(row, column)| keypad.grid().label(row, column))
        .collect()
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!("Architecture {}", System::cpu_arch());

    let row_nos = parse_pin_list(&var("KEYCLOCK_KEYPAD_PINS_ROWS")?)?;
    let col_nos = parse_pin_list(&var("KEYCLOCK_KEYPAD_PINS_COLS")?)?;
    let grid = KeypadGrid::standard();
    if row_nos.len() != grid.rows() || col_nos.len() != grid.columns() {
        eyre::bail!(
            "Expected {} row and {} column pins for the standard keypad",
            grid.rows(),
            grid.columns()
        );
    }
    info!("Keypad @ Rows: {:?}, Cols: {:?}", row_nos, col_nos);

    let gpio_chip = var("KEYCLOCK_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let gpio = GpiodDriver::open(&gpio_chip)?;
    debug!("{:?} opened, {} lines.", gpio, gpio.count()?);

    let mut row_pins = row_nos.iter().map(|&no| gpio.get_pin(no)).collect::<GpioResult<Vec<_>>>()?;
    let mut col_pins = col_nos.iter().map(|&no| gpio.get_pin(no)).collect::<GpioResult<Vec<_>>>()?;
    for pin in &mut row_pins {
        pin.set_drive_mode(GpioDriveMode::OpenDrain)?;
        pin.set_active_level(GpioActiveLevel::Low)?;
    }
    for pin in &mut col_pins {
        pin.set_bias(GpioBias::PullUp)?;
        pin.set_active_level(GpioActiveLevel::Low)?;
    }
    let row_outs = row_pins.iter_mut().map(|pin| pin.as_output()).collect::<GpioResult<Vec<_>>>()?;
    let col_ins = col_pins.iter_mut().map(|pin| pin.as_input()).collect::<GpioResult<Vec<_>>>()?;

    let mut keypad = MatrixKeypad::new(
        row_outs.iter().map(|out| &**out as &dyn GpioOutput).collect(),
        col_ins.iter().map(|input| &**input as &dyn GpioInput).collect(),
        grid,
    )?;
    info!("{:?} ready, press some keys.", keypad);
    for row in 0..keypad.grid().rows() {
        let labels: String = (0..keypad.grid().columns())
            .filter_map(|column| keypad.grid().label(row, column))
            .collect();
        println!("{}", labels);
    }

    let mut edge = PressEdge::new();
    let mut last_map = String::new();

    loop {
        match keypad.scan() {
            Ok(scan) => {
                if let Some(key) = edge.register(&scan) {
                    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
                    info!("{} pressed at {}", key, now.format(&Rfc3339)?);
                }
            }
            Err(e) => warn!("Scan failed: {}", e),
        }

        let map = keypad.debounce_state().to_string();
        if map != last_map {
            println!("{}held: [{}]", map, held_labels(&keypad));
            last_map = map;
        }

        sleep(Duration::from_millis(10));
    }
}
