use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;
use timetable_store::{
    DayOfWeek, ErrorKind, JsonFileStore, LessonFields, LessonFilter, MemorySnapshotStore,
    PersistenceError, PersistenceResult, SNAPSHOT_FORMAT_VERSION, Snapshot, SnapshotStore,
    StoreError, Timetable, export_lessons_csv,
};

fn seed(timetable: &Timetable) {
    let g1 = timetable.create_group("IVT-21").unwrap().id;
    let g2 = timetable.create_group("IVT-22").unwrap().id;
    let t1 = timetable.create_teacher("Ivanov Ivan Ivanovich").unwrap().id;
    let t2 = timetable.create_teacher("Kozlov Aleksey").unwrap().id;
    let s1 = timetable.create_subject("Operating Systems").unwrap().id;
    let r1 = timetable.create_classroom("201").unwrap().id;
    let r2 = timetable.create_classroom("202").unwrap().id;

    timetable
        .create_lesson(LessonFields {
            group_id: g1,
            subject_id: s1,
            teacher_id: t1,
            classroom_id: r1,
            day_of_week: DayOfWeek::Wednesday,
            lesson_number: 2,
        })
        .unwrap();
    timetable
        .create_lesson(LessonFields {
            group_id: g2,
            subject_id: s1,
            teacher_id: t2,
            classroom_id: r2,
            day_of_week: DayOfWeek::Monday,
            lesson_number: 1,
        })
        .unwrap();
}

/// Commits to memory until `fail` is set, then refuses every commit.
#[derive(Default)]
struct FlakyStore {
    inner: MemorySnapshotStore,
    fail: Arc<AtomicBool>,
}

impl SnapshotStore for FlakyStore {
    fn load(&self) -> PersistenceResult<Option<Snapshot>> {
        self.inner.load()
    }

    fn commit(&self, snapshot: &Snapshot) -> PersistenceResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io(std::io::Error::other("disk unplugged")));
        }
        self.inner.commit(snapshot)
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

#[test]
fn json_store_round_trips_catalogs_and_schedule() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timetable.json");

    let (groups, teachers, subjects, classrooms, lessons) = {
        let timetable = Timetable::open(JsonFileStore::new(&path)).unwrap();
        seed(&timetable);
        (
            timetable.list_groups().unwrap(),
            timetable.list_teachers().unwrap(),
            timetable.list_subjects().unwrap(),
            timetable.list_classrooms().unwrap(),
            timetable.list_lessons(&LessonFilter::all()).unwrap(),
        )
    };
    assert!(path.exists());

    let reloaded = Timetable::open(JsonFileStore::new(&path)).unwrap();
    assert_eq!(reloaded.list_groups().unwrap(), groups);
    assert_eq!(reloaded.list_teachers().unwrap(), teachers);
    assert_eq!(reloaded.list_subjects().unwrap(), subjects);
    assert_eq!(reloaded.list_classrooms().unwrap(), classrooms);
    assert_eq!(
        reloaded.list_lessons(&LessonFilter::all()).unwrap(),
        lessons
    );
}

#[test]
fn missing_snapshot_starts_empty_and_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("data").join("timetable.json");

    let timetable = Timetable::open(JsonFileStore::new(&path)).unwrap();
    assert!(timetable.list_groups().unwrap().is_empty());
    assert!(!path.exists());

    timetable.create_group("G1").unwrap();
    assert!(path.exists());
}

#[test]
fn sequences_survive_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timetable.json");
    {
        let timetable = Timetable::open(JsonFileStore::new(&path)).unwrap();
        seed(&timetable);
        timetable.delete_group(2).unwrap();
        timetable.delete_lesson(1).unwrap();
    }

    let timetable = Timetable::open(JsonFileStore::new(&path)).unwrap();
    assert_eq!(timetable.create_group("IVT-23").unwrap().id, 3);
    let lesson = timetable
        .create_lesson(LessonFields {
            group_id: 3,
            subject_id: 1,
            teacher_id: 1,
            classroom_id: 1,
            day_of_week: DayOfWeek::Friday,
            lesson_number: 6,
        })
        .unwrap();
    assert_eq!(lesson.id, 3);
}

/// Lets a test keep a handle on the store a timetable commits to.
struct Shared(Arc<MemorySnapshotStore>);
impl SnapshotStore for Shared {
    fn load(&self) -> PersistenceResult<Option<Snapshot>> {
        self.0.load()
    }
    fn commit(&self, snapshot: &Snapshot) -> PersistenceResult<()> {
        self.0.commit(snapshot)
    }
    fn describe(&self) -> String {
        self.0.describe()
    }
}

#[test]
fn every_mutation_is_durable_before_returning() {
    let store = Arc::new(MemorySnapshotStore::new());
    let timetable = Timetable::open(Shared(store.clone())).unwrap();
    assert!(store.latest().is_none());

    let group = timetable.create_group("G1").unwrap();
    assert_eq!(store.latest().unwrap().groups, vec![group.clone()]);

    timetable.update_group(group.id, "G1a").unwrap();
    assert_eq!(store.latest().unwrap().groups[0].name, "G1a");

    timetable.delete_group(group.id).unwrap();
    let latest = store.latest().unwrap();
    assert!(latest.groups.is_empty());
    assert_eq!(latest.sequences.group, 2);
    let mut current = timetable.snapshot();
    current.saved_at = latest.saved_at;
    assert_eq!(latest, current);
}

#[test]
fn failed_commit_leaves_state_unchanged() {
    let store = FlakyStore::default();
    let fail = store.fail.clone();
    let timetable = Timetable::open(store).unwrap();
    seed(&timetable);
    let before = timetable.list_lessons(&LessonFilter::all()).unwrap();

    fail.store(true, Ordering::SeqCst);
    let err = timetable.create_group("G-new").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert!(matches!(err, StoreError::Persistence(_)));

    let err = timetable.delete_classroom(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    let err = timetable
        .create_lesson(LessonFields {
            group_id: 1,
            subject_id: 1,
            teacher_id: 1,
            classroom_id: 1,
            day_of_week: DayOfWeek::Saturday,
            lesson_number: 1,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    assert_eq!(timetable.list_groups().unwrap().len(), 2);
    assert_eq!(timetable.list_classrooms().unwrap().len(), 2);
    assert_eq!(timetable.list_lessons(&LessonFilter::all()).unwrap(), before);

    // The failed create did not consume an id.
    fail.store(false, Ordering::SeqCst);
    assert_eq!(timetable.create_group("G-new").unwrap().id, 3);
}

#[test]
fn atomic_commit_leaves_no_temp_file_and_ignores_stale_ones() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timetable.json");
    let store = JsonFileStore::new(&path);
    let temp_path = store.temp_path();

    let timetable = Timetable::open(store).unwrap();
    timetable.create_group("G1").unwrap();
    assert!(!temp_path.exists());

    // A torn temp file from an interrupted write must not affect loading.
    fs::write(&temp_path, b"{ \"format_version\": 1, \"groups\": [").unwrap();
    drop(timetable);
    let timetable = Timetable::open(JsonFileStore::new(&path)).unwrap();
    assert_eq!(timetable.list_groups().unwrap().len(), 1);

    timetable.create_group("G2").unwrap();
    assert!(!temp_path.exists());
    let reloaded = Timetable::open(JsonFileStore::new(&path)).unwrap();
    assert_eq!(reloaded.list_groups().unwrap().len(), 2);
}

#[test]
fn failed_file_commit_keeps_previous_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timetable.json");
    let timetable = Timetable::open(JsonFileStore::new(&path)).unwrap();
    timetable.create_group("G1").unwrap();
    let before = fs::read_to_string(&path).unwrap();

    // A directory squatting on the temp path makes the write fail.
    fs::create_dir(JsonFileStore::new(&path).temp_path()).unwrap();
    let err = timetable.create_group("G2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    assert_eq!(timetable.list_groups().unwrap().len(), 1);
}

#[test]
fn corrupt_snapshot_files_are_io_failures() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timetable.json");
    fs::write(&path, "not json").unwrap();

    let err = Timetable::open(JsonFileStore::new(&path)).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

fn valid_snapshot() -> Snapshot {
    let timetable = Timetable::in_memory();
    seed(&timetable);
    timetable.snapshot()
}

fn assert_rejected(snapshot: Snapshot, needle: &str) {
    let err = Timetable::open(MemorySnapshotStore::with_snapshot(snapshot))
        .err()
        .unwrap();
    match err {
        StoreError::Persistence(PersistenceError::InvalidSnapshot(message)) => {
            assert!(message.contains(needle), "{message}");
        }
        other => panic!("expected an invalid snapshot error, got {other:?}"),
    }
}

#[test]
fn snapshots_breaking_invariants_are_rejected_on_load() {
    let snapshot = valid_snapshot();
    Timetable::open(MemorySnapshotStore::with_snapshot(snapshot.clone())).unwrap();

    let mut wrong_version = snapshot.clone();
    wrong_version.format_version = SNAPSHOT_FORMAT_VERSION + 1;
    assert_rejected(wrong_version, "format version");

    let mut dangling = snapshot.clone();
    dangling.lessons[0].fields.teacher_id = 40;
    assert_rejected(dangling, "missing teacher 40");

    let mut double_booked = snapshot.clone();
    double_booked.lessons[1].fields.teacher_id = double_booked.lessons[0].fields.teacher_id;
    double_booked.lessons[1].fields.day_of_week = double_booked.lessons[0].fields.day_of_week;
    double_booked.lessons[1].fields.lesson_number =
        double_booked.lessons[0].fields.lesson_number;
    assert_rejected(double_booked, "double-books teacher");

    let mut out_of_range = snapshot.clone();
    out_of_range.lessons[0].fields.lesson_number = 9;
    assert_rejected(out_of_range, "out of range");

    let mut duplicate_name = snapshot.clone();
    duplicate_name.groups[1].name = duplicate_name.groups[0].name.clone();
    assert_rejected(duplicate_name, "duplicates name");

    let mut stale_sequence = snapshot.clone();
    stale_sequence.sequences.lesson = 1;
    assert_rejected(stale_sequence, "lesson id");

    let mut empty_name = snapshot.clone();
    empty_name.classrooms[0].room_number = " ".to_string();
    assert_rejected(empty_name, "empty room_number");

    let mut zero_group_sequence = snapshot.clone();
    zero_group_sequence.groups.clear();
    zero_group_sequence.lessons.clear();
    zero_group_sequence.sequences.group = 0;
    assert_rejected(zero_group_sequence, "group sequence 0 is below 1");

    let mut zero_lesson_sequence = snapshot;
    zero_lesson_sequence.lessons.clear();
    zero_lesson_sequence.sequences.lesson = 0;
    assert_rejected(zero_lesson_sequence, "lesson sequence 0 is below 1");
}

#[test]
fn exhausted_id_sequences_fail_without_committing() {
    let mut snapshot = valid_snapshot();
    snapshot.sequences.group = i64::MAX;
    snapshot.sequences.lesson = i64::MAX;
    let store = Arc::new(MemorySnapshotStore::with_snapshot(snapshot.clone()));
    let timetable = Timetable::open(Shared(store.clone())).unwrap();

    let err = timetable.create_group("IVT-23").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalInconsistency);

    let groups = timetable.list_groups().unwrap();
    let teachers = timetable.list_teachers().unwrap();
    let subjects = timetable.list_subjects().unwrap();
    let classrooms = timetable.list_classrooms().unwrap();
    let err = timetable
        .create_lesson(LessonFields {
            group_id: groups[0].id,
            subject_id: subjects[0].id,
            teacher_id: teachers[0].id,
            classroom_id: classrooms[0].id,
            day_of_week: DayOfWeek::Friday,
            lesson_number: 8,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalInconsistency);

    assert_eq!(timetable.list_groups().unwrap().len(), 2);
    assert_eq!(store.latest().unwrap().sequences, snapshot.sequences);
    Timetable::open(Shared(store)).unwrap();
}

#[test]
fn csv_export_writes_one_row_per_lesson() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("schedule.csv");
    let timetable = Timetable::in_memory();
    seed(&timetable);
    let lessons = timetable.list_lessons(&LessonFilter::all()).unwrap();

    export_lessons_csv(&path, &lessons).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "id,day_of_week,lesson_number,group_id,group_name,subject_id,subject_name,teacher_id,teacher_name,classroom_id,classroom_number"
    );
    assert_eq!(lines[1], "2,Monday,1,2,IVT-22,1,Operating Systems,2,Kozlov Aleksey,2,202");
    assert!(lines[2].starts_with("1,Wednesday,2,1,IVT-21,"));
}
