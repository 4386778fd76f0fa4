fn main() {
  cfg_aliases::cfg_aliases! {
      // socket(2) takes SOCK_CLOEXEC and accept4(2) exists.
      atomic_cloexec: { any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "illumos",
        target_os = "hurd",
        target_os = "linux",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "cygwin"
      ) },
  }
}
