mod app;
mod config;
mod credentials;
mod feedback;
mod led;
mod session;
mod sound;

use std::env::var;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use dotenv::dotenv;
use log::{debug, info, warn};
use keyclock_gpio::{GpioDriver, GpioInput, GpioOutput, GpioPin, GpioResult};
use keyclock_gpio::GpioActiveLevel::Low;
use keyclock_gpio::GpioBias::PullUp;
use keyclock_gpio::GpioDriveMode::OpenDrain;
use keyclock_gpio::gpiod::GpiodDriver;
use keyclock_gpio::keypad::MatrixKeypad;
use keyclock_gpio::pwm::SysfsPwmChip;
use crate::app::App;
use crate::config::Config;
use crate::credentials::JsonCredentialStore;
use crate::feedback::{FeedbackDispatcher, SoundPlayer};
use crate::led::RgbLed;
use crate::sound::{BuzzerSounds, SilentSounds};

const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

fn get_pins<'a>(gpio: &'a dyn GpioDriver, numbers: &[usize]) -> GpioResult<Vec<Box<dyn GpioPin + 'a>>> {
    numbers.iter().map(|&number| gpio.get_pin(number)).collect()
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("keyclock starting...");

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load()? {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    let settings = config.keypad_settings()?;
    let led_stays_on_for = config.led_stays_on_for()?;

    info!("Keypad @ Rows: {:?}, Cols: {:?}", settings.row_pins, settings.column_pins);
    info!("LED @ R: {}, G: {}, B: {}", config.led.red_pin, config.led.green_pin, config.led.blue_pin);

    debug!("Initializing GPIO driver...");
    let gpio_chip = var("KEYCLOCK_GPIO_CHIP").unwrap_or_else(|_| DEFAULT_GPIO_CHIP.to_string());
    let gpio = GpiodDriver::open(&gpio_chip)?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing keypad driver...");
    let mut row_pins = get_pins(&gpio, &settings.row_pins)?;
    let mut column_pins = get_pins(&gpio, &settings.column_pins)?;
    for pin in &mut row_pins {
        pin.set_drive_mode(OpenDrain)?;
        pin.set_active_level(Low)?;
    }
    for pin in &mut column_pins {
        pin.set_bias(PullUp)?;
        pin.set_active_level(Low)?;
    }
    let row_outs = row_pins
        .iter_mut()
        .map(|pin| pin.as_output())
        .collect::<GpioResult<Vec<_>>>()?;
    let column_ins = column_pins
        .iter_mut()
        .map(|pin| pin.as_input())
        .collect::<GpioResult<Vec<_>>>()?;

    let mut keypad = MatrixKeypad::new(
        row_outs.iter().map(|out| &**out as &dyn GpioOutput).collect(),
        column_ins.iter().map(|input| &**input as &dyn GpioInput).collect(),
        settings.grid.clone(),
    )?;
    debug!("{:?} initialized.", keypad);

    debug!("Initializing status LED...");
    let mut red_pin = gpio.get_pin(config.led.red_pin)?;
    let mut green_pin = gpio.get_pin(config.led.green_pin)?;
    let mut blue_pin = gpio.get_pin(config.led.blue_pin)?;
    let red_out = red_pin.as_output()?;
    let green_out = green_pin.as_output()?;
    let blue_out = blue_pin.as_output()?;
    let mut led = RgbLed::new(&*red_out, &*green_out, &*blue_out, led_stays_on_for)?;
    debug!("{:?} initialized.", led);

    debug!("Initializing buzzer...");
    let mut buzzer_pin = match config.sound.pwm_chip {
        Some(chip) => match SysfsPwmChip::open(chip).and_then(|chip| chip.export(config.sound.pwm_channel)) {
            Ok(pin) => Some(pin),
            Err(e) => {
                warn!("Buzzer unavailable, continuing without sound: {}", e);
                None
            }
        },
        None => None,
    };
    let mut buzzer;
    let mut silent = SilentSounds;
    let sound: &mut dyn SoundPlayer = match &mut buzzer_pin {
        Some(pin) => {
            buzzer = BuzzerSounds::new(pin);
            &mut buzzer
        }
        None => &mut silent,
    };
    debug!("{:?} initialized.", sound);

    let mut store = JsonCredentialStore::new(
        &config.credentials.users_file,
        &config.credentials.access_log_file,
    );
    match store.load_users() {
        Ok(users) => info!("{} users in {:?}.", users.len(), config.credentials.users_file),
        Err(e) => warn!("User table unreadable, every PIN will be rejected until fixed: {}", e),
    }

    info!("keyclock initialized.");
    info!("Starting main loop...");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let mut app = App::new(
        &mut keypad,
        &mut store,
        FeedbackDispatcher::new(&mut led, sound),
        &settings,
    );

    while running.load(Ordering::SeqCst) {
        app.update(Instant::now());

        thread::sleep(Duration::from_millis(10));
    }

    app.shutdown();
    info!("keyclock stopped.");
    Ok(())
}
