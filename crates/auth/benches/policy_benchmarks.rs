use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use uniserp_auth::{AccessPolicy, Catalog, RoleName, RoleSet};

fn bench_evaluate(c: &mut Criterion) {
    let policy = AccessPolicy::from_catalog(&Catalog::university());

    let cases: &[(&str, RoleSet, &str, &str)] = &[
        ("admin_bypass", RoleSet::from([RoleName::Admin]), "delete", "hostels"),
        ("single_role_allow", RoleSet::from([RoleName::Lecturer]), "create", "attendance"),
        ("single_role_deny", RoleSet::from([RoleName::Student]), "delete", "users"),
        (
            "multi_role_allow",
            RoleSet::from([RoleName::Student, RoleName::Bursar, RoleName::Lecturer]),
            "update",
            "payments",
        ),
        ("unknown_action", RoleSet::from([RoleName::Dean]), "launch", "courses"),
    ];

    let mut group = c.benchmark_group("policy_evaluate");
    for (name, roles, action, resource) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), roles, |b, roles| {
            b.iter(|| policy.evaluate(black_box(roles), black_box(action), black_box(resource)))
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let catalog = Catalog::university();
    c.bench_function("policy_from_catalog", |b| {
        b.iter(|| AccessPolicy::from_catalog(black_box(&catalog)))
    });
}

criterion_group!(benches, bench_evaluate, bench_build);
criterion_main!(benches);
