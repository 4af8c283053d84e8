// test of drives attached to image files
use cbmdrive::img::DiskType;
use cbmdrive::vdrive::{Drive,ErrorCode,Status};
use tempfile;

fn put(drive: &mut Drive,name: &[u8],dat: &[u8]) {
    assert_eq!(drive.open(name,1),Status::Ok,"{}",drive.error_string());
    for b in dat {
        assert_eq!(drive.write(1,*b),Status::Ok);
    }
    assert_eq!(drive.close(1),Status::Ok);
}

fn get(drive: &mut Drive,name: &[u8]) -> Vec<u8> {
    assert_eq!(drive.open(name,0),Status::Ok,"{}",drive.error_string());
    let mut ans = Vec::new();
    loop {
        match drive.read(0) {
            (b,Status::Ok) => ans.push(b),
            (_,Status::Eof) => break,
            (_,Status::Error) => panic!("read failed: {}",drive.error_string())
        }
    }
    drive.close(0);
    ans
}

#[test]
fn create_sizes() {
    let dir = tempfile::tempdir().expect("no temp dir");
    for (typ,tracks,ext,len) in [
        (DiskType::D64,35,"d64",174848),
        (DiskType::D64,40,"d64",196608),
        (DiskType::D71,70,"d71",349696),
        (DiskType::D81,80,"d81",819200),
        (DiskType::D80,77,"d80",533248),
        (DiskType::D82,154,"d82",1066496)
    ] {
        let path = dir.path().join(format!("disk{}.{}",tracks,ext));
        let path_str = path.to_str().expect("bad path");
        let mut drive = cbmdrive::create_file(path_str,typ,tracks,b"SIZES,SZ",8).expect("create failed");
        assert_eq!(drive.error_code(),ErrorCode::Ok);
        drive.detach();
        assert_eq!(std::fs::metadata(&path).expect("no image").len(),len);
    }
}

#[test]
fn changes_persist() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let path = dir.path().join("persist.d64");
    let path_str = path.to_str().expect("bad path");
    let dat: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
    let mut drive = cbmdrive::create_file(path_str,DiskType::D64,35,b"PERSIST,PS",8).expect("create failed");
    put(&mut drive,b"DATA,S,W",&dat);
    put(&mut drive,b"GONE,P,W",b"XYZ");
    assert_eq!(drive.command("S:GONE"),ErrorCode::FilesScratched);
    drive.detach();

    let mut drive = cbmdrive::attach_file(path_str,9).expect("attach failed");
    assert_eq!(drive.unit(),9);
    assert_eq!(get(&mut drive,b"DATA,S"),dat);
    assert_eq!(drive.open(b"GONE",0),Status::Error);
    assert_eq!(drive.error_code(),ErrorCode::FileNotFound);
    let names: Vec<Vec<u8>> = drive.entries().expect("no directory").iter().map(|s| s.short_name()).collect();
    assert_eq!(names,vec![b"DATA".to_vec()]);
    // 4 blocks for the file
    assert_eq!(drive.bam().expect("no bam").free_block_count(),660);
}

#[test]
fn gcr_refused() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let path = dir.path().join("flux.g64");
    let mut dat = b"GCR-1541".to_vec();
    dat.extend_from_slice(&[0,84,0xf8,0x1e]);
    dat.resize(4096,0);
    std::fs::write(&path,&dat).expect("write failed");
    assert!(cbmdrive::attach_file(path.to_str().expect("bad path"),8).is_err());
    assert!(cbmdrive::img::store::probe(&path).is_ok());
}

#[test]
fn unknown_size_refused() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let path = dir.path().join("odd.d64");
    std::fs::write(&path,vec![0;1000]).expect("write failed");
    assert!(cbmdrive::attach_file(path.to_str().expect("bad path"),8).is_err());
}

#[test]
fn read_only_file() {
    let dir = tempfile::tempdir().expect("no temp dir");
    let path = dir.path().join("locked.d81");
    let path_str = path.to_str().expect("bad path");
    let mut drive = cbmdrive::create_file(path_str,DiskType::D81,80,b"LOCKED,LK",8).expect("create failed");
    put(&mut drive,b"KEEP",b"HELLO");
    drive.detach();
    let mut perms = std::fs::metadata(&path).expect("no image").permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&path,perms).expect("cannot change permissions");
    // root can write anyway, only check the outcome when the lock took hold
    if std::fs::OpenOptions::new().write(true).open(&path).is_err() {
        let mut drive = cbmdrive::attach_file(path_str,8).expect("attach failed");
        assert_eq!(get(&mut drive,b"KEEP"),b"HELLO".to_vec());
        assert_eq!(drive.open(b"NEW,S,W",2),Status::Error);
        assert_eq!(drive.error_code(),ErrorCode::WriteProtectOn);
    }
}
