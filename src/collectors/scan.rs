use crate::collectors::command::{Cancel, CommandRunner};
use crate::error::CommandError;
use crate::models::disk::DiskSet;
use log::debug;

/// Run `smartctl --scan-open` and merge every device it reports into `disks`.
///
/// Lines are applied as they stream in, so a scan that fails halfway still
/// contributes what it printed.
pub fn probe(runner: &CommandRunner, cancel: &Cancel, disks: &mut DiskSet) -> Result<(), CommandError> {
    runner.run(cancel, &["--scan-open"], |stream| {
        for line in stream {
            apply_scan_line(&line, disks);
        }
    })
}

/// One `--scan-open` line, e.g.
/// `/dev/sda -d sat # /dev/sda [SAT], ATA device` or
/// `/dev/bus/0 -d megaraid,0 # /dev/bus/0 [megaraid_disk_00], SCSI device`.
///
/// Compound controller specifiers (`megaraid,0`) become the key since the
/// bus path alone doesn't identify a disk behind a RAID card.
pub fn apply_scan_line(line: &str, disks: &mut DiskSet) {
    let fields: Vec<&str> = line.split_whitespace().collect();
    debug!("scan-open {:?}", fields);

    if fields.len() < 3 || fields[0] == "#" {
        return;
    }

    if fields[2].contains(',') {
        disks.insert(fields[2], fields[0]);
    } else {
        disks.insert(fields[0], fields[2]);
    }
}
