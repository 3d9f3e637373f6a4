use std::num::NonZeroU32;
use std::time::Duration;

use awg520::prelude::*;

fn config(num_steps: u32) -> TriggerConfig {
    TriggerConfig {
        dwell_time: Duration::from_millis(1),
        num_steps: NonZeroU32::new(num_steps).expect("nonzero"),
        resolution: Duration::from_nanos(100),
    }
}

#[test]
fn end_to_end_trigger_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let files = write_trigger_sequence(dir.path(), &config(100))?;

    for name in ["trig_1.wfm", "trig_2.wfm", "arm_1.wfm", "arm_2.wfm"] {
        assert!(dir.path().join(name).is_file(), "{name} missing");
    }
    assert_eq!(4, files.waveforms.len());
    assert_eq!(dir.path().join("odmr_trigger.seq"), files.sequence);

    let text = String::from_utf8(std::fs::read(&files.sequence)?)?;
    let lines = text.split("\r\n").collect::<Vec<_>>();
    assert_eq!("MAGIC 3002", lines[0]);
    assert_eq!("LINES 2", lines[1]);
    assert_eq!("\"arm_1.wfm\",\"arm_2.wfm\",0,1,0,0", lines[2]);
    assert_eq!("\"trig_1.wfm\",\"trig_2.wfm\",100,1,0,0", lines[3]);
    assert_eq!("JUMP_MODE SOFTWARE", lines[4]);
    assert_eq!(1, text.matches("JUMP_MODE").count());
    Ok(())
}

#[test]
fn waveform_windows_match_the_dwell_period() -> anyhow::Result<()> {
    // 1 ms dwell at 100 ns resolution: 10000 ticks, gate on the first 5000
    let dir = tempfile::tempdir()?;
    write_trigger_sequence(dir.path(), &config(100))?;

    let decode = |name: &str| -> anyhow::Result<(Waveform, f64)> {
        Ok(Waveform::decode(&std::fs::read(dir.path().join(name))?)?)
    };

    let (measure, clock_hz) = decode("trig_1.wfm")?;
    assert_eq!(1e7, clock_hz);
    assert_eq!(10_000, measure.len());
    measure
        .markers()
        .iter()
        .enumerate()
        .for_each(|(tick, bit)| assert_eq!(tick < 5_000, bit, "trig_1 tick {tick}"));

    let (green, _) = decode("trig_2.wfm")?;
    assert_eq!(10_000, green.len());
    assert!(green.markers().iter().all(|bit| bit));

    let (arm_measure, _) = decode("arm_1.wfm")?;
    assert_eq!(10_000, arm_measure.len());
    assert!(arm_measure.markers().iter().all(|bit| !bit));

    let (arm_green, _) = decode("arm_2.wfm")?;
    assert_eq!(10_000, arm_green.len());
    assert!(arm_green.markers().iter().all(|bit| bit));
    Ok(())
}

#[rstest::rstest]
#[test]
#[case(1)]
#[case(7)]
#[case(100_000)]
fn table_always_has_two_entries(#[case] num_steps: u32) -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let files = write_trigger_sequence(dir.path(), &config(num_steps))?;
    let table = SequenceFile::decode(&std::fs::read(&files.sequence)?)?;
    assert_eq!(2, table.entries().len());
    assert_eq!(JumpMode::Software, table.jump_mode());
    assert_eq!(Repeat::Infinite, table.entries()[0].repeat);
    assert_eq!(
        Repeat::finite(num_steps).expect("nonzero"),
        table.entries()[1].repeat
    );
    Ok(())
}

#[test]
fn unwritable_destination_reports_file_write_error() -> anyhow::Result<()> {
    // pass a plain file as the destination directory
    let not_a_dir = tempfile::NamedTempFile::new()?;
    let result = write_trigger_sequence(not_a_dir.path(), &config(100));
    assert!(matches!(result, Err(Awg520Error::FileWrite(_))));
    assert!(!not_a_dir.path().join("odmr_trigger.seq").exists());
    Ok(())
}
