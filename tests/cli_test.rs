use assert_cmd::cargo; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn mkdsk(dimg_path: &std::path::Path,typ: &str) -> STDRESULT {
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("mkdsk")
        .arg("-v").arg("TEST DISK,AB").arg("-t").arg(typ)
        .arg("-d").arg(dimg_path)
        .assert()
        .success();
    Ok(())
}

#[test]
fn mkdsk_d64() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.d64");
    mkdsk(&dimg_path,"d64")?;
    assert_eq!(std::fs::metadata(&dimg_path)?.len(),174848);
    Ok(())
}

#[test]
fn mkdsk_refuses_existing() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("twice.d81");
    mkdsk(&dimg_path,"d81")?;
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("mkdsk")
        .arg("-v").arg("OTHER,01").arg("-t").arg("d81")
        .arg("-d").arg(&dimg_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
    Ok(())
}

#[test]
fn mkdsk_bad_tracks() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("bad.d64");
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("mkdsk")
        .arg("-v").arg("BAD,01").arg("-t").arg("d64").arg("--tracks").arg("50")
        .arg("-d").arg(&dimg_path)
        .assert()
        .failure();
    assert!(!dimg_path.exists());
    Ok(())
}

#[test]
fn put_get_catalog() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("files.d64");
    mkdsk(&dimg_path,"d64")?;
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("put")
        .arg("-f").arg("HELLO").arg("-t").arg("seq")
        .arg("-d").arg(&dimg_path)
        .write_stdin("HELLO FROM THE DRIVE\r")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("get")
        .arg("-f").arg("HELLO")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("HELLO FROM THE DRIVE\r");
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("catalog")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 \"TEST DISK       \" AB 2A"))
        .stdout(predicate::str::contains("1    \"HELLO\"            SEQ"))
        .stdout(predicate::str::contains("663 BLOCKS FREE."));
    Ok(())
}

#[test]
fn put_twice() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("twice.d71");
    mkdsk(&dimg_path,"d71")?;
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("put").arg("-f").arg("PROG").arg("-d").arg(&dimg_path)
        .write_stdin(vec![0x01,0x08,0x00,0x00])
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("put").arg("-f").arg("PROG").arg("-d").arg(&dimg_path)
        .write_stdin(vec![0x01,0x08])
        .assert()
        .failure()
        .stderr(predicate::str::contains("63,FILE EXISTS,00,00"));
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("put").arg("-f").arg("PROG").arg("--replace").arg("-d").arg(&dimg_path)
        .write_stdin(vec![0x01,0x08])
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("get").arg("-f").arg("PROG").arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout(vec![0x01u8,0x08]);
    Ok(())
}

#[test]
fn delete_and_rename() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("names.d81");
    mkdsk(&dimg_path,"d81")?;
    for name in ["ONE","TWO"] {
        let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
        cmd.arg("put").arg("-f").arg(name).arg("-d").arg(&dimg_path)
            .write_stdin("x")
            .assert()
            .success();
    }
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("rename").arg("-f").arg("TWO").arg("-n").arg("THREE").arg("-d").arg(&dimg_path)
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("delete").arg("-f").arg("ONE").arg("-d").arg(&dimg_path)
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("catalog").arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"THREE\"").and(predicate::str::contains("\"ONE\"").not()));
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("get").arg("-f").arg("ONE").arg("-d").arg(&dimg_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("62,FILE NOT FOUND,00,00"));
    Ok(())
}

#[test]
fn command_channel() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("cmd.d80");
    mkdsk(&dimg_path,"d80")?;
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("cmd").arg("-c").arg("I").arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("00,OK,00,00\n");
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("cmd").arg("-c").arg("XYZZY").arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("31,SNERR INVALID COMMAND,00,00\n");
    Ok(())
}

#[test]
fn read_block() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("block.d64");
    mkdsk(&dimg_path,"d64")?;
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    let output = cmd.arg("block").arg("-t").arg("18").arg("-s").arg("0").arg("-d").arg(&dimg_path)
        .output()?;
    assert!(output.status.success());
    assert_eq!(output.stdout.len(),256);
    assert_eq!(&output.stdout[0..3],&[18,1,0x41]);
    assert_eq!(&output.stdout[0x90..0x99],b"TEST DISK");
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("block").arg("-t").arg("36").arg("-s").arg("0").arg("-d").arg(&dimg_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("66,ILLEGAL TRACK OR SECTOR,36,00"));
    Ok(())
}

#[test]
fn info_json() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("info.d82");
    mkdsk(&dimg_path,"d82")?;
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    cmd.arg("put").arg("-f").arg("NOTES").arg("-t").arg("usr").arg("-d").arg(&dimg_path)
        .write_stdin("notes")
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("cbmdrive");
    let output = cmd.arg("info").arg("-d").arg(&dimg_path).output()?;
    assert!(output.status.success());
    let obj = json::parse(&String::from_utf8(output.stdout)?)?;
    assert_eq!(obj["type"],"d82");
    assert_eq!(obj["tracks"],154);
    assert_eq!(obj["name"],"TEST DISK");
    assert_eq!(obj["id"],"AB");
    assert_eq!(obj["free"],4132);
    assert_eq!(obj["read_only"],false);
    assert_eq!(obj["files"].len(),1);
    assert_eq!(obj["files"][0]["name"],"NOTES");
    assert_eq!(obj["files"][0]["type"],"usr");
    assert_eq!(obj["files"][0]["blocks"],1);
    assert_eq!(obj["files"][0]["closed"],true);
    Ok(())
}
