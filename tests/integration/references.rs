//! Reference resolution: HEAD, loose refs, packed-refs, enumeration.

use gitcore::{ObjectId, RefError, Repository};

use crate::fixtures::{oid, RepoFixture};

const AA: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const BB: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const CC: &str = "cccccccccccccccccccccccccccccccccccccccc";

#[test]
fn head_indirection_through_loose_ref() {
    let fixture = RepoFixture::worktree();
    fixture.write_head("ref: refs/heads/main\n");
    fixture.write_ref("refs/heads/main", &oid(AA));

    let repo = Repository::open(fixture.root()).unwrap();
    let head = repo.head().unwrap();
    assert_eq!(head.name, "refs/heads/main");
    assert_eq!(head.id.to_hex(), AA);
}

#[test]
fn detached_head_is_malformed() {
    let fixture = RepoFixture::worktree();
    fixture.write_head(&format!("{AA}\n"));

    let repo = Repository::open(fixture.root()).unwrap();
    assert!(matches!(
        repo.head(),
        Err(RefError::MalformedRef { .. })
    ));
}

#[test]
fn packed_ref_with_peeled_tag() {
    let fixture = RepoFixture::worktree();
    fixture.write_packed_refs(&format!("{AA} refs/tags/v1.0\n^{BB}\n"));

    let repo = Repository::open(fixture.root()).unwrap();
    let tag = repo.ref_by_name("refs/tags/v1.0").unwrap();
    assert_eq!(tag.id.to_hex(), AA);
    assert_eq!(tag.peeled.unwrap().to_hex(), BB);
}

#[test]
fn comments_ignored_in_packed_refs() {
    let fixture = RepoFixture::worktree();
    fixture.write_packed_refs(&format!(
        "# pack-refs with: peeled fully-peeled sorted\n{AA} refs/heads/main # tail comment\n"
    ));

    let repo = Repository::open(fixture.root()).unwrap();
    assert_eq!(
        repo.ref_by_name("refs/heads/main").unwrap().id.to_hex(),
        AA
    );
}

#[test]
fn loose_ref_shadows_packed() {
    let fixture = RepoFixture::worktree();
    fixture.write_packed_refs(&format!("{AA} refs/heads/main\n"));
    fixture.write_ref("refs/heads/main", &oid(BB));

    let repo = Repository::open(fixture.root()).unwrap();
    assert_eq!(
        repo.ref_by_name("refs/heads/main").unwrap().id.to_hex(),
        BB
    );
}

#[test]
fn missing_ref_is_not_found() {
    let fixture = RepoFixture::worktree();
    let repo = Repository::open(fixture.root()).unwrap();
    assert!(matches!(
        repo.ref_by_name("refs/heads/absent"),
        Err(RefError::NotFound { .. })
    ));
}

#[test]
fn branches_merge_loose_over_packed() {
    let fixture = RepoFixture::worktree();
    fixture.write_packed_refs(&format!(
        "{AA} refs/heads/main\n{BB} refs/heads/old\n{CC} refs/tags/v1\n"
    ));
    fixture.write_ref("refs/heads/main", &oid(CC)); // shadows packed
    fixture.write_ref("refs/heads/feature", &oid(BB)); // new

    let repo = Repository::open(fixture.root()).unwrap();
    let branches = repo.branches().unwrap();

    assert_eq!(branches.len(), 3);
    // Packed file order first, loose additions after.
    assert_eq!(branches[0].name, "refs/heads/main");
    assert_eq!(branches[0].id.to_hex(), CC);
    assert_eq!(branches[1].name, "refs/heads/old");
    assert_eq!(branches[2].name, "refs/heads/feature");
}

#[test]
fn tags_enumeration_is_scoped() {
    let fixture = RepoFixture::worktree();
    fixture.write_packed_refs(&format!("{AA} refs/heads/main\n{BB} refs/tags/v1\n"));
    fixture.write_ref("refs/tags/v2", &oid(CC));

    let repo = Repository::open(fixture.root()).unwrap();
    let tags = repo.tags().unwrap();

    let names: Vec<_> = tags.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["refs/tags/v1", "refs/tags/v2"]);
}

#[test]
fn empty_repo_has_no_branches() {
    let fixture = RepoFixture::worktree();
    let repo = Repository::open(fixture.root()).unwrap();
    assert!(repo.branches().unwrap().is_empty());
    assert!(repo.tags().unwrap().is_empty());
}

#[test]
fn head_resolves_through_packed_refs() {
    let fixture = RepoFixture::worktree();
    fixture.write_head("ref: refs/heads/main\n");
    fixture.write_packed_refs(&format!("{BB} refs/heads/main\n"));

    let repo = Repository::open(fixture.root()).unwrap();
    assert_eq!(repo.head().unwrap().id.to_hex(), BB);
}

#[test]
fn head_object_is_readable() {
    let fixture = RepoFixture::worktree();
    let commit_id = ObjectId::new([0x0d; 20]);
    let body = "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
                author A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\n\ntip";
    fixture.write_loose(&commit_id, "commit", body.as_bytes());
    fixture.write_head("ref: refs/heads/main\n");
    fixture.write_ref("refs/heads/main", &commit_id);

    let repo = Repository::open(fixture.root()).unwrap();
    let head = repo.head().unwrap();
    let obj = repo.object(head.id).unwrap();
    assert_eq!(obj.as_commit().unwrap().message(), b"tip");
}
